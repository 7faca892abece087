pub mod pool;
pub mod queue;

pub use pool::WorkerPool;
pub use queue::{AdmissionQueue, Dequeued, EnqueueError};
