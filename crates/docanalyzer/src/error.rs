use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid value '{value}' for environment variable {name}: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors surfaced synchronously to callers of the coordinator.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Admission queue is full ({capacity} jobs waiting), retry later")]
    Backpressure { capacity: usize },

    #[error("Coordinator is shutting down, no new jobs are accepted")]
    ShuttingDown,
}

/// Errors from the text extraction stage.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Document contains no readable text")]
    EmptyContent,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Document text is required for {analysis}")]
    EmptyInput { analysis: &'static str },
}

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker count must be at least 1")]
    NoWorkers,
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
