//! Tracing subscriber setup.
//!
//! Log lines go to stderr so that reports on stdout stay machine-readable.
//! `RUST_LOG` overrides the default filter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "warn,shadowlink_sync=info,shadowlink_cli=info";
const VERBOSE_FILTER: &str = "info,shadowlink_sync=debug,shadowlink_cli=debug";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line, for log aggregation.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown log format: {s} (expected text or json)")),
        }
    }
}

/// Filter directive used when `RUST_LOG` is unset.
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Install the global subscriber.
///
/// A second call is a no-op, which keeps tests that drive several commands
/// in one process working.
pub fn init_logging(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            )
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!(filter = default_filter(verbose), ?format, "Logging initialized");
    }
}
