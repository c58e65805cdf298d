//! Tracing subscriber bootstrap.

use anyhow::anyhow;
use bookstore_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Build the event filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_level)
            .map_err(|err| anyhow!("invalid log level '{}': {}", settings.log_level, err)),
    }
}

/// Install the global tracing subscriber. Safe to call more than once; later
/// calls leave the first subscriber in place.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if let Err(err) = installed {
        tracing::debug!(target: "bookstore-telemetry", %err, "tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!(
        target: "bookstore-telemetry",
        level = %settings.log_level,
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}
