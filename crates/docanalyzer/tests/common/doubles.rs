//! Extractor and mirror doubles.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use docanalyzer::db::DatabaseError;
use docanalyzer::error::ProcessError;
use docanalyzer::{JobRecord, JobStatus, PersistenceMirror, ProcessorRegistry, TextExtractor};

/// Records which thread extracted which path, then delegates to the real registry.
#[derive(Default)]
pub struct RecordingExtractor {
    inner: ProcessorRegistry,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingExtractor {
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_per_path(&self) -> HashMap<PathBuf, usize> {
        let mut counts = HashMap::new();
        for (_, path) in self.calls() {
            *counts.entry(path).or_insert(0) += 1;
        }
        counts
    }
}

impl TextExtractor for RecordingExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ProcessError> {
        let thread = std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();
        self.calls.lock().unwrap().push((thread, path.to_path_buf()));
        self.inner.extract_text(path)
    }
}

/// Blocks every extraction until [`GatedExtractor::release`] is called.
#[derive(Default)]
pub struct GatedExtractor {
    inner: ProcessorRegistry,
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Default)]
struct GateState {
    open: bool,
    entered: usize,
}

impl GatedExtractor {
    pub fn release(&self) {
        self.state.lock().unwrap().open = true;
        self.changed.notify_all();
    }

    /// Waits until at least `count` extractions are parked at the gate.
    pub fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let guard = self.state.lock().unwrap();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| s.entered < count)
            .unwrap();
        guard.entered >= count
    }
}

impl TextExtractor for GatedExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ProcessError> {
        {
            let mut state = self.state.lock().unwrap();
            state.entered += 1;
            self.changed.notify_all();
            while !state.open {
                state = self.changed.wait(state).unwrap();
            }
        }
        self.inner.extract_text(path)
    }
}

/// Keeps every snapshot it is handed.
#[derive(Default)]
pub struct RecordingMirror {
    snapshots: Mutex<Vec<JobRecord>>,
}

impl RecordingMirror {
    pub fn statuses_for(&self, id: &str) -> Vec<JobStatus> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.id == id)
            .map(|r| r.status)
            .collect()
    }

    /// Ids the mirror has heard of, in first-seen order.
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for record in self.snapshots.lock().unwrap().iter() {
            if !ids.contains(&record.id) {
                ids.push(record.id.clone());
            }
        }
        ids
    }
}

impl PersistenceMirror for RecordingMirror {
    fn upsert(&self, record: &JobRecord) -> Result<(), DatabaseError> {
        self.snapshots.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// A mirror whose backend is always down.
pub struct UnavailableMirror;

impl UnavailableMirror {
    fn error() -> DatabaseError {
        DatabaseError::Io {
            path: PathBuf::from("/unreachable/jobs.db"),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        }
    }
}

impl PersistenceMirror for UnavailableMirror {
    fn upsert(&self, _record: &JobRecord) -> Result<(), DatabaseError> {
        Err(Self::error())
    }

    fn fetch(&self, _id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        Err(Self::error())
    }
}
