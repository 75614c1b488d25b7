//! Logging setup for the command-line binary.

use tracing::{Level, subscriber::SetGlobalDefaultError};

/// Installs a compact `tracing` subscriber writing to stderr.
///
/// `verbose` lowers the threshold from INFO to DEBUG.
pub fn init_logging(verbose: bool) -> Result<(), SetGlobalDefaultError> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}
