// Logging setup for the command-line tool.
// Installs a tracing subscriber filtered by RUST_LOG or the verbosity flag.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Filter used when RUST_LOG is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "remote_svg=debug"
    } else {
        "remote_svg=info"
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean for content.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
