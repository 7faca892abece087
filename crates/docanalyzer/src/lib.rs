pub mod analysis;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod job;
pub mod logging;
pub mod persistence;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod worker;

pub use analysis::{
    analyze_metrics, assess_risk, AnalysisResult, InvestmentAnalysis, Recommendation,
    RiskAssessment, RiskLevel,
};
pub use config::{load_config, Config};
pub use coordinator::{JobCoordinator, JobCoordinatorBuilder, DEFAULT_QUERY};
pub use db::{Database, SqliteMirror};
pub use error::{
    AnalyzerError, ConfigError, CoordinatorError, JobStoreError, ProcessError, Result,
    WorkerError,
};
pub use job::{JobEvent, JobId, JobRecord, JobStatus, JobStore};
pub use persistence::{PersistenceError, PersistenceMirror};
pub use pipeline::{Pipeline, PipelineContext, PipelineError, PipelineStage};
pub use processor::{ProcessorRegistry, TextExtractor};
