//! Error type shared by the daemon client, queue view and exclusion store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("daemon is not connected")]
    Unreachable,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("daemon rejected '{command}' (code {code}): {message}")]
    DaemonRejected {
        code: u32,
        command: String,
        message: String,
    },
    #[error("persistence failed: {0}")]
    Persistence(#[source] std::io::Error),
    #[error("daemon i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("daemon did not answer in time during {0}")]
    Timeout(&'static str),
    #[error("malformed daemon response: {0}")]
    Protocol(String),
}

impl SyncError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SyncError::InvalidArgument(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        SyncError::Protocol(message.into())
    }

    /// Errors after which the connection to the daemon can no longer be trusted.
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            SyncError::Io(_) | SyncError::Timeout(_) | SyncError::Protocol(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
