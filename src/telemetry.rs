//! Tracing subscriber setup shared by the service and the one-shot binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "news_galore=info,pipeline=info,fetch=info,publish=info,filter=info,auth=info,warn";

/// Install a global subscriber. `RUST_LOG` overrides the default filter;
/// `NEWS_LOG_JSON=1` switches to JSON lines.
///
/// No-op if a subscriber is already installed (the Shuttle runtime may have done so).
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("NEWS_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
