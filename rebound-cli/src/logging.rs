//! Subscriber setup for the CLI.

use tracing_subscriber::EnvFilter;

// Target prefix match: covers rebound_core and rebound_cli.
const DEFAULT_FILTER: &str = "rebound=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
