//! `docanalyzer` command-line front end.
//!
//! Copies each input into the data directory, submits the copies to a
//! [`JobCoordinator`] and prints every final job record as JSON.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use docanalyzer::config::{load_config, Config};
use docanalyzer::{logging, AnalyzerError, JobCoordinator, JobStatus};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Analyze financial documents with a bounded worker pool.
#[derive(Debug, Parser)]
#[command(name = "docanalyzer", version, about)]
struct Cli {
    /// JSON configuration file. Defaults plus environment overrides when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Number of workers, overriding the configuration.
    #[arg(long, short)]
    workers: Option<usize>,

    /// Analysis instruction attached to every document.
    #[arg(long, short, default_value = "")]
    query: String,

    /// Analyze inline, one document at a time, without the job queue.
    #[arg(long, default_value_t = false)]
    sync: bool,

    /// Documents to analyze (.pdf, .txt, .md).
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> Result<(), AnalyzerError> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::from_env()?,
    };
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }

    logging::init(&config.log);
    tracing::info!("Starting docanalyzer v{}", env!("CARGO_PKG_VERSION"));

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        if let Err(e) = ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        }) {
            tracing::warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    let coordinator = JobCoordinator::start(&config)?;

    let all_ok = if cli.sync {
        run_sync(&coordinator, &config, &cli)
    } else {
        run_queued(&coordinator, &config, &cli, &interrupted)
    };

    coordinator.shutdown();

    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}

fn run_sync(coordinator: &JobCoordinator, config: &Config, cli: &Cli) -> bool {
    let mut all_ok = true;

    for file in &cli.files {
        let staged = match stage_file(&config.data_directory, file) {
            Ok(path) => path,
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                all_ok = false;
                continue;
            }
        };

        match coordinator.analyze_now(&cli.query, &staged) {
            Ok(result) => print_json(&serde_json::json!({
                "status": "completed",
                "fileProcessed": file.display().to_string(),
                "result": result,
            })),
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                all_ok = false;
            }
        }
    }

    all_ok
}

fn run_queued(
    coordinator: &JobCoordinator,
    config: &Config,
    cli: &Cli,
    interrupted: &AtomicBool,
) -> bool {
    let mut all_ok = true;
    let mut submitted = Vec::new();
    let mut events = coordinator.subscribe();

    for file in &cli.files {
        let staged = match stage_file(&config.data_directory, file) {
            Ok(path) => path,
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                all_ok = false;
                continue;
            }
        };

        match coordinator.submit(&cli.query, &staged) {
            Ok(id) => {
                tracing::info!(job_id = %id, file = %file.display(), "Submitted");
                submitted.push(id);
            }
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                let _ = std::fs::remove_file(&staged);
                all_ok = false;
            }
        }
    }

    loop {
        while let Ok(event) = events.try_recv() {
            tracing::debug!(job_id = %event.job_id, status = %event.status, "Job event");
        }

        let finished = submitted.iter().all(|id| {
            coordinator
                .status(id)
                .map(|r| r.status.is_terminal())
                .unwrap_or(true)
        });
        if finished {
            break;
        }
        if interrupted.load(Ordering::SeqCst) {
            tracing::warn!("Interrupted, shutting down");
            coordinator.shutdown();
            all_ok = false;
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    for id in &submitted {
        match coordinator.status(id) {
            Ok(record) => {
                if record.status != JobStatus::Completed {
                    all_ok = false;
                }
                print_json(&record);
            }
            Err(e) => {
                eprintln!("{}", e);
                all_ok = false;
            }
        }
    }

    all_ok
}

/// Copies `source` into `data_dir` as `financial_document_<uuid>.<ext>`.
fn stage_file(data_dir: &Path, source: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(data_dir)?;

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("pdf")
        .to_lowercase();
    let target = data_dir.join(format!(
        "financial_document_{}.{}",
        uuid::Uuid::new_v4(),
        extension
    ));

    std::fs::copy(source, &target)?;
    Ok(target)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}
