//! Authoritative in-memory job table.
//!
//! Records live behind their own `Mutex` inside a `RwLock`-guarded map, so a
//! transition on one job never blocks reads or transitions of another. The
//! map write lock is only taken to insert or remove entries.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::JobStoreError;
use crate::persistence::PersistenceMirror;

use super::events::{JobEvent, JobEventBroadcaster};
use super::record::{JobId, JobRecord};

type RecordCell = Arc<Mutex<JobRecord>>;

pub struct JobStore {
    records: RwLock<HashMap<JobId, RecordCell>>,
    mirror: Option<Arc<dyn PersistenceMirror>>,
    events: JobEventBroadcaster,
}

impl JobStore {
    /// Creates a store without a persistence mirror.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            mirror: None,
            events: JobEventBroadcaster::default(),
        }
    }

    /// Creates a store that mirrors every transition to `mirror`.
    pub fn with_mirror(mirror: Arc<dyn PersistenceMirror>) -> Self {
        Self {
            mirror: Some(mirror),
            ..Self::new()
        }
    }

    pub fn has_mirror(&self) -> bool {
        self.mirror.is_some()
    }

    pub fn mirror(&self) -> Option<&Arc<dyn PersistenceMirror>> {
        self.mirror.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Inserts a new `queued` record and returns a snapshot of it.
    pub fn create(&self, query: &str, source_path: &Path) -> JobRecord {
        match self.create_with(query, source_path, |_| Ok::<(), Infallible>(())) {
            Ok(record) => record,
            Err(never) => match never {},
        }
    }

    /// Inserts a new `queued` record and passes its id to `admit` before the
    /// record is mirrored or broadcast.
    ///
    /// If `admit` fails the record is dropped unpublished, so neither the
    /// mirror nor subscribers ever hear of it, and the error is returned.
    /// The record lock is held throughout: a worker that picks the id up as
    /// soon as `admit` hands it over blocks in its claim until the queued
    /// snapshot is out.
    pub fn create_with<E, F>(
        &self,
        query: &str,
        source_path: &Path,
        admit: F,
    ) -> Result<JobRecord, E>
    where
        F: FnOnce(&JobId) -> Result<(), E>,
    {
        let record = JobRecord::new(query, source_path);
        let id = record.id.clone();
        let cell = Arc::new(Mutex::new(record));

        let guard = lock_record(&cell);
        self.write_map().insert(id.clone(), Arc::clone(&cell));

        if let Err(e) = admit(&id) {
            self.write_map().remove(&id);
            tracing::debug!(job_id = %id, "Job not admitted");
            return Err(e);
        }

        self.publish(&guard);
        let snapshot = guard.clone();
        drop(guard);

        tracing::debug!(job_id = %id, "Job created");
        Ok(snapshot)
    }

    /// Returns a consistent snapshot of one record.
    pub fn get(&self, id: &str) -> Result<JobRecord, JobStoreError> {
        let cell = self.cell(id)?;
        let guard = lock_record(&cell);
        Ok(guard.clone())
    }

    /// Applies `mutator` under exclusive access to the record.
    ///
    /// The mutator works on a copy; the copy is committed only if it returns
    /// `Ok`, so a rejected transition leaves the record untouched and is
    /// neither mirrored nor broadcast.
    pub fn transition<F>(&self, id: &str, mutator: F) -> Result<JobRecord, JobStoreError>
    where
        F: FnOnce(&mut JobRecord) -> Result<(), JobStoreError>,
    {
        let cell = self.cell(id)?;
        let mut guard = lock_record(&cell);

        let mut next = guard.clone();
        mutator(&mut next)?;
        *guard = next;

        self.publish(&guard);
        Ok(guard.clone())
    }

    /// Snapshots of all records, oldest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let cells: Vec<RecordCell> = self.read_map().values().cloned().collect();
        let mut records: Vec<JobRecord> = cells.iter().map(|c| lock_record(c).clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    /// Drops terminal records last updated before `cutoff`.
    /// Queued and processing records are never evicted.
    ///
    /// Records are inspected without the map write lock, which is only taken
    /// for the final removal. Terminal records never change again, so the
    /// decision cannot go stale in between.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let cells: Vec<(JobId, RecordCell)> = self
            .read_map()
            .iter()
            .map(|(id, cell)| (id.clone(), Arc::clone(cell)))
            .collect();

        let expired: Vec<JobId> = cells
            .into_iter()
            .filter(|(_, cell)| {
                let record = lock_record(cell);
                record.is_finished() && record.updated_at < cutoff
            })
            .map(|(id, _)| id)
            .collect();
        if expired.is_empty() {
            return 0;
        }

        let mut map = self.write_map();
        let evicted = expired.iter().filter(|id| map.remove(*id).is_some()).count();
        drop(map);
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted finished jobs");
        }
        evicted
    }

    fn cell(&self, id: &str) -> Result<RecordCell, JobStoreError> {
        self.read_map()
            .get(id)
            .cloned()
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))
    }

    /// Mirrors and broadcasts a committed snapshot. Called with the record lock held.
    fn publish(&self, record: &JobRecord) {
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.upsert(record) {
                tracing::error!(
                    job_id = %record.id,
                    status = %record.status,
                    "Failed to persist job snapshot: {}",
                    e
                );
            }
        }
        self.events.send(JobEvent::from_record(record));
    }

    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<JobId, RecordCell>> {
        match self.records.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("Job store map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, HashMap<JobId, RecordCell>> {
        match self.records.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("Job store map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_record(cell: &RecordCell) -> MutexGuard<'_, JobRecord> {
    match cell.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("Job record lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
