//! Error types for skiff-core

use thiserror::Error;

/// Result type alias using the skiff Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by storage backends
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed address; never retried
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Bad settings or configuration file; never retried
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client construction or reachability probe failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// List, download or upload failed
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// The object does not fit within a service limit; never retried
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the retry executor should try the operation again.
    ///
    /// Connection and transfer failures are retried. Local I/O is retried
    /// only for transient kinds, so a full disk or a closed sink fails fast.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Transfer(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            Error::InvalidPath(_) | Error::Config(_) | Error::LimitExceeded(_) => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
