//! Process-wide tracing setup.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Installs the global subscriber and routes `log` records into it.
///
/// `RUST_LOG` wins over `config.level`. Safe to call more than once; later
/// calls are no-ops.
pub fn init(config: &LogConfig) {
    let filter = build_filter(config);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true);

    let _ = if config.json {
        builder.json().with_target(false).try_init()
    } else {
        builder.try_init()
    };

    // Already installed by the subscriber unless another logger got there first
    let _ = tracing_log::LogTracer::init();
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
