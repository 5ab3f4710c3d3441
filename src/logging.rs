//! Logging initialization.
//!
//! Logs go to stderr so stdout carries only data output. `RUST_LOG` takes
//! precedence over the configured level.

use crate::domain::settings::LoggingSettings;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(settings: &LoggingSettings) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    // try_init fails only when a subscriber is already installed
    let _ = if settings.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}
