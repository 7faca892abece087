use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{JobStoreError, WorkerError};
use crate::job::{JobId, JobStore};
use crate::pipeline::{Pipeline, PipelineContext, PipelineError};
use crate::worker::queue::{AdmissionQueue, Dequeued};

/// How long an idle worker waits on the queue before re-checking shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of worker threads draining one admission queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    processed: Arc<AtomicUsize>,
}

/// Everything a worker thread shares with its siblings.
struct WorkerShared {
    queue: AdmissionQueue,
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    shutdown: Arc<AtomicBool>,
    processed: Arc<AtomicUsize>,
    finish_in_flight: bool,
}

impl WorkerPool {
    /// Spawns `worker_count` threads named `worker-1..worker-N`.
    pub fn start(
        worker_count: usize,
        finish_in_flight: bool,
        queue: &AdmissionQueue,
        store: Arc<JobStore>,
        pipeline: Arc<Pipeline>,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::NoWorkers);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let processed = Arc::new(AtomicUsize::new(0));
        let mut pool = Self {
            workers: Vec::with_capacity(worker_count),
            shutdown: Arc::clone(&shutdown),
            processed: Arc::clone(&processed),
        };

        for n in 1..=worker_count {
            let name = format!("worker-{}", n);
            let shared = WorkerShared {
                queue: queue.clone(),
                store: Arc::clone(&store),
                pipeline: Arc::clone(&pipeline),
                shutdown: Arc::clone(&shutdown),
                processed: Arc::clone(&processed),
                finish_in_flight,
            };

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(name, shared));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    // Stop whatever already started before reporting
                    pool.shutdown();
                    pool.join_all();
                    return Err(WorkerError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!("Started {} workers", worker_count);
        Ok(pool)
    }

    /// Signals every worker to stop after its current job. Does not block.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!("Shutting down worker pool...");
        }
    }

    /// Joins every worker thread. Call [`shutdown`](Self::shutdown) first.
    pub fn wait(mut self) {
        self.join_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Number of jobs that reached a terminal state through this pool.
    pub fn processed_count(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub(crate) fn processed_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.processed)
    }

    fn join_all(&mut self) {
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if let Err(e) = worker.join() {
                error!("{} panicked: {:?}", name, e);
            } else {
                debug!("{} finished", name);
            }
        }
        info!("All workers have stopped");
    }
}

fn run_worker(name: String, shared: WorkerShared) {
    debug!("{} started", name);

    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            debug!("{} received shutdown signal", name);
            break;
        }

        match shared.queue.dequeue_timeout(POLL_INTERVAL) {
            Dequeued::Job(id) => process_job(&name, &shared, id),
            Dequeued::Idle => continue,
            Dequeued::Closed => {
                debug!("{} admission queue closed", name);
                break;
            }
        }
    }

    debug!("{} stopped", name);
}

fn process_job(worker: &str, shared: &WorkerShared, id: JobId) {
    let _span = tracing::info_span!("job", worker = %worker, job_id = %id).entered();

    let record = match shared.store.transition(&id, |r| r.claim(worker)) {
        Ok(record) => record,
        Err(JobStoreError::NotFound(_)) => {
            debug!("{} dropping unknown job {}", worker, id);
            return;
        }
        Err(e @ JobStoreError::InvalidTransition { .. }) => {
            debug!("{} dropping job {}: {}", worker, id, e);
            return;
        }
    };

    let ctx = PipelineContext::from_record(&record);
    let should_stop = || !shared.finish_in_flight && shared.shutdown.load(Ordering::SeqCst);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        shared.pipeline.run(&ctx, &should_stop)
    }))
    .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload.as_ref()))));

    // Observers of a terminal state must also observe the artifact gone
    remove_artifact(&ctx);

    let committed = match outcome {
        Ok(result) => shared.store.transition(&id, move |r| r.complete(result)),
        Err(e) => {
            warn!("Job {} failed: {}", id, e);
            let message = e.to_string();
            shared.store.transition(&id, move |r| r.fail(message))
        }
    };

    match committed {
        Ok(record) => {
            shared.processed.fetch_add(1, Ordering::SeqCst);
            info!("Job {} {} on {}", id, record.status, worker);
        }
        Err(e) => error!("Job {} could not be finalized: {}", id, e),
    }
}

fn remove_artifact(ctx: &PipelineContext) {
    if let Err(e) = std::fs::remove_file(&ctx.source_path) {
        debug!(
            "Could not remove artifact for job {}: {}",
            ctx.job_id, e
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
