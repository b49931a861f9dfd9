//! Logging initialization. Every stage function wraps its work in a
//! [`tracing::info_span!`] recording the stage name and terminal status;
//! candidate/action/relaxation counts are logged at `debug`.

use crate::config::LoggingConfig;

/// Initializes the global `tracing` subscriber from the resolved logging
/// configuration. Call once, from the CLI entry point.
pub fn init(config: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);
    let result = if config.format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    if let Err(err) = result {
        eprintln!("telemetry already initialized: {err}");
    }
}
