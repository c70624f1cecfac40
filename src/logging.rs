//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`; user-facing output is printed
//! separately by [`crate::output::OutputFormatter`].

use std::env;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding a full `EnvFilter` directive, e.g. `aitidy=debug`.
pub const LOG_ENV: &str = "AITIDY_LOG";

/// Filter directive for a `-v` count when `AITIDY_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,aitidy=info",
        2 => "warn,aitidy=debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logger(verbosity: u8) {
    let filter_layer = env::var(LOG_ENV)
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter_layer)
        .try_init();
}
