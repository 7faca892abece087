//! Job records, their lifecycle, and the shared store that owns them.

pub mod events;
pub mod record;
pub mod store;

pub use events::{JobEvent, JobEventBroadcaster};
pub use record::{JobId, JobRecord, JobStatus};
pub use store::JobStore;
