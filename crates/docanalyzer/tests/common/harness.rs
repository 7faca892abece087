//! Test harness for isolated coordinator runs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use docanalyzer::{JobCoordinator, JobRecord, JobStatus};

/// Upper bound on how long a test waits for jobs to settle.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

pub const PROFITABLE_NO_DEBT: &str =
    "Annual report. Revenue: $1,000,000 for the year. Net Income: $200,000 after taxes.";

/// Test harness providing an isolated data directory.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Where submitted documents are written.
    pub data_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir_all(&data_dir).expect("Failed to create data dir");
        Self { temp_dir, data_dir }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a text document into the data directory.
    pub fn write_text(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.data_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write document");
        path
    }

    /// Write `count` distinct text documents and return their paths.
    pub fn write_many(&self, count: usize, content: &str) -> Vec<PathBuf> {
        (0..count)
            .map(|i| self.write_text(&format!("financial_document_{}.txt", i), content))
            .collect()
    }

    /// Write a one-page PDF whose content stream shows `text`.
    pub fn write_pdf(&self, filename: &str, text: &str) -> PathBuf {
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        let content_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            }),
        );
        doc.objects.insert(
            resources_id,
            Object::Dictionary(dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            }),
        );
        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
        );
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let path = self.data_dir.join(filename);
        doc.save(&path).expect("Failed to write PDF");
        path
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Waits for a job to reach a terminal state and returns the final record.
pub fn wait_for_terminal(coordinator: &JobCoordinator, id: &str) -> JobRecord {
    let settled = wait_until(SETTLE_TIMEOUT, || {
        coordinator
            .status(id)
            .map(|r| r.status.is_terminal())
            .unwrap_or(false)
    });
    let record = coordinator.status(id).expect("job should exist");
    assert!(settled, "job {} stuck in {}", id, record.status);
    record
}

pub fn assert_completed(record: &JobRecord) {
    assert_eq!(
        record.status,
        JobStatus::Completed,
        "job {} failed: {:?}",
        record.id,
        record.error
    );
    assert!(record.result.is_some());
    assert!(record.error.is_none());
}
