//! Job admission, status lookup and lifecycle control.
//!
//! [`JobCoordinator`] owns the admission queue, the job store and the
//! worker pool. Submitting a document creates a `queued` record and hands its
//! id to the queue; a worker claims it, runs the pipeline and records the
//! outcome. Callers poll [`JobCoordinator::status`] or subscribe to events.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::analysis::AnalysisResult;
use crate::config::Config;
use crate::db::SqliteMirror;
use crate::error::{CoordinatorError, Result};
use crate::job::{JobEvent, JobId, JobRecord, JobStore};
use crate::persistence::PersistenceMirror;
use crate::pipeline::{Pipeline, PipelineContext, PipelineError};
use crate::processor::{ProcessorRegistry, TextExtractor};
use crate::worker::{AdmissionQueue, EnqueueError, WorkerPool};

/// Query used when a caller submits an empty one.
pub const DEFAULT_QUERY: &str = "Analyze this financial document for investment insights.";

pub struct JobCoordinatorBuilder {
    workers: usize,
    queue_capacity: usize,
    finish_in_flight: bool,
    mirror: Option<Arc<dyn PersistenceMirror>>,
    extractor: Option<Arc<dyn TextExtractor>>,
}

impl JobCoordinatorBuilder {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn finish_in_flight(mut self, finish: bool) -> Self {
        self.finish_in_flight = finish;
        self
    }

    pub fn mirror(mut self, mirror: Arc<dyn PersistenceMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Builds the queue and store, then launches the workers.
    pub fn start(self) -> Result<JobCoordinator> {
        if self.queue_capacity == 0 {
            return Err(crate::error::ConfigError::Validation {
                message: "queue_capacity must be at least 1".to_string(),
            }
            .into());
        }

        let queue = AdmissionQueue::bounded(self.queue_capacity);
        let store = Arc::new(match self.mirror {
            Some(mirror) => JobStore::with_mirror(mirror),
            None => JobStore::new(),
        });
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(ProcessorRegistry::new()) as Arc<dyn TextExtractor>);
        let pipeline = Arc::new(Pipeline::new(extractor));

        let pool = WorkerPool::start(
            self.workers,
            self.finish_in_flight,
            &queue,
            Arc::clone(&store),
            Arc::clone(&pipeline),
        )?;

        tracing::info!(
            workers = self.workers,
            queue_capacity = self.queue_capacity,
            persistence = store.has_mirror(),
            "Job coordinator started"
        );

        Ok(JobCoordinator {
            store,
            queue,
            pipeline,
            stopping: pool.stop_signal(),
            processed: pool.processed_counter(),
            pool: Mutex::new(Some(pool)),
        })
    }
}

impl Default for JobCoordinatorBuilder {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            finish_in_flight: true,
            mirror: None,
            extractor: None,
        }
    }
}

pub struct JobCoordinator {
    store: Arc<JobStore>,
    queue: AdmissionQueue,
    pipeline: Arc<Pipeline>,
    stopping: Arc<AtomicBool>,
    processed: Arc<AtomicUsize>,
    pool: Mutex<Option<WorkerPool>>,
}

impl JobCoordinator {
    pub fn builder() -> JobCoordinatorBuilder {
        JobCoordinatorBuilder::default()
    }

    /// Starts a coordinator from configuration, opening the SQLite mirror
    /// when the database is enabled.
    pub fn start(config: &Config) -> Result<Self> {
        let mut builder = Self::builder()
            .workers(config.worker_count)
            .queue_capacity(config.queue_capacity)
            .finish_in_flight(config.finish_in_flight);

        if config.database.enabled {
            let mirror = SqliteMirror::open(&config.database.path)?;
            builder = builder.mirror(Arc::new(mirror));
        }

        builder.start()
    }

    /// Admits a document for asynchronous analysis.
    ///
    /// The file must be a readable regular file now; it is deleted by the
    /// worker once the job finishes. On `Backpressure` or `ShuttingDown`
    /// nothing is retained, mirrored or broadcast, and the file is left to
    /// the caller.
    pub fn submit(
        &self,
        query: &str,
        source_path: impl AsRef<Path>,
    ) -> std::result::Result<JobId, CoordinatorError> {
        if self.is_shutting_down() {
            return Err(CoordinatorError::ShuttingDown);
        }

        let source_path = source_path.as_ref();
        validate_source(source_path)?;

        let record = self
            .store
            .create_with(&normalize_query(query), source_path, |id| {
                self.queue.enqueue(id.clone()).map_err(|e| match e {
                    EnqueueError::Full(_) => {
                        tracing::warn!(capacity = self.queue.capacity(), "Admission queue full");
                        CoordinatorError::Backpressure {
                            capacity: self.queue.capacity(),
                        }
                    }
                    EnqueueError::Closed(_) => CoordinatorError::ShuttingDown,
                })
            })?;

        tracing::info!(job_id = %record.id, file = %record.file_name, "Job queued");
        Ok(record.id)
    }

    /// Current snapshot of a job. Falls back to the mirror for ids no
    /// longer (or never) held in memory.
    pub fn status(&self, id: &str) -> std::result::Result<JobRecord, CoordinatorError> {
        if let Ok(record) = self.store.get(id) {
            return Ok(record);
        }

        if let Some(mirror) = self.store.mirror() {
            match mirror.fetch(id) {
                Ok(Some(record)) => return Ok(record),
                Ok(None) => {}
                Err(e) => tracing::warn!(job_id = %id, "Mirror read-back failed: {}", e),
            }
        }

        Err(CoordinatorError::NotFound(id.to_string()))
    }

    /// Snapshots of every job held in memory, oldest first.
    pub fn jobs(&self) -> Vec<JobRecord> {
        self.store.list()
    }

    /// Events for every committed transition of admitted jobs. Rejected
    /// submissions produce no events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.store.subscribe()
    }

    /// Runs the pipeline inline on the calling thread without creating a
    /// job. The file is deleted afterwards whatever the outcome.
    pub fn analyze_now(
        &self,
        query: &str,
        source_path: impl AsRef<Path>,
    ) -> std::result::Result<AnalysisResult, PipelineError> {
        let source_path = source_path.as_ref();
        let ctx = PipelineContext::new(
            format!("sync-{}", uuid::Uuid::new_v4()),
            normalize_query(query),
            source_path.to_path_buf(),
        );

        let result = self.pipeline.run(&ctx, &|| false);

        if let Err(e) = std::fs::remove_file(source_path) {
            tracing::debug!("Could not remove {}: {}", source_path.display(), e);
        }
        result
    }

    /// Drops finished jobs whose last update is older than `age`.
    pub fn evict_finished_older_than(&self, age: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        match cutoff {
            Some(cutoff) => self.store.evict_finished_before(cutoff),
            // Older than representable time: nothing can qualify
            None => 0,
        }
    }

    /// Stops accepting work, closes the admission queue, lets workers finish
    /// per the shutdown policy and joins them. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let pool = self.lock_pool().take();
        if let Some(pool) = pool {
            pool.shutdown();
            self.queue.close();
            pool.wait();
            tracing::info!(
                processed = self.processed_count(),
                still_queued = self.queue.len(),
                "Job coordinator stopped"
            );
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Number of jobs that reached a terminal state.
    pub fn processed_count(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    fn lock_pool(&self) -> MutexGuard<'_, Option<WorkerPool>> {
        match self.pool.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("Worker pool lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Drop for JobCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate_source(path: &Path) -> std::result::Result<(), CoordinatorError> {
    let invalid = |reason: String| CoordinatorError::InvalidInput {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = std::fs::metadata(path).map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_file() {
        return Err(invalid("not a regular file".to_string()));
    }
    std::fs::File::open(path).map_err(|e| invalid(e.to_string()))?;
    Ok(())
}

fn normalize_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        trimmed.to_string()
    }
}
