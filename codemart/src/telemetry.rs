//! Tracing initialisation.
//!
//! Log output goes to stdout through `tracing-subscriber`'s fmt layer, either human-readable or
//! as one JSON object per line (`log_format: json`). The level filter comes from `RUST_LOG` and
//! defaults to `info`:
//!
//! ```bash
//! RUST_LOG=codemart=debug,tower_http=info codemart -f config.yaml
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init()?;
        }
    }

    info!(?format, "Telemetry initialized");
    Ok(())
}
