//! Logging initialization
//!
//! `sb-core` logs through the `log` facade; the subscriber installed here
//! also picks those records up.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::Cli;

/// Initialize logging from the verbosity flags. `RUST_LOG` takes precedence.
pub fn init(cli: &Cli) -> Result<(), String> {
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(cli.verbose >= 2),
        )
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}
