//! Process-wide tracing setup for the `vigil` binary.
//!
//! Session loggers emit their console entries through the global subscriber,
//! so the filter installed here decides which of those entries are shown.
//! Only the Vigil crates log at the requested level; dependencies are held
//! at `warn` unless a filter variable says otherwise.
//!
//! Filter precedence: `VIGIL_LOG`, then `RUST_LOG`, then [`default_directives`].

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding a Vigil-specific filter.
pub const LOG_FILTER_ENV: &str = "VIGIL_LOG";

/// Tracing targets of the Vigil crates.
pub const VIGIL_TARGETS: [&str; 3] = ["vigil", "vigil_core", "vigil_harness"];

/// Filter directives used when no filter variable is set.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(VIGIL_TARGETS.iter().map(|t| format!("{t}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Initialise the global tracing subscriber.
///
/// `json` switches to newline-delimited JSON lines. Only the first call in a
/// process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = build_filter(level);

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!(event = "tracing.initialised", json, level = %level);
    }
}
