//! Log subscriber setup for the server binary.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset. Targets are prefix-matched, so
/// this covers every `kgp_*` crate.
pub const DEFAULT_FILTER: &str = "kgp=info";

/// Install the global subscriber: plain text on stderr, or one JSON object
/// per event when `log_json` is set.
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if log_json {
        builder.json().with_current_span(false).init();
    } else {
        builder.init();
    }
}
