use std::time::Duration;
use thiserror::Error;

/// Errors raised while locating or running the control utility.
///
/// Whether an error disables the collector depends on when it happens: during
/// the initial check every error is fatal, afterwards only the retry budget
/// decides.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// The control binary is not in any searched directory
    #[error("cannot locate \"{name}\" binary")]
    BinaryNotFound { name: String },

    /// The command could not be started
    #[error("failed to run \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully
    #[error("error running \"{command}\" ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The command did not finish within the configured timeout
    #[error("\"{command}\" did not finish within {after:?}")]
    Timeout { command: String, after: Duration },

    /// The command produced output that is not text
    #[error("\"{command}\" produced unreadable output")]
    InvalidOutput { command: String },

    /// A collection was requested before a successful check
    #[error("collector is not active")]
    NotActive,
}

pub type Result<T> = std::result::Result<T, CollectorError>;
