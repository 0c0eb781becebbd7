//! Error types for the floodcast protocol.

use std::fmt;

/// Result type alias for floodcast operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during floodcast operations.
#[derive(Debug)]
pub enum Error {
    /// Failed to decode an inbound payload. The payload was rejected before
    /// any state was touched.
    Decode(String),

    /// Internal channel error (queue closed or rejected a message).
    Channel(String),

    /// The node has been shut down.
    Shutdown,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode(msg) => {
                write!(f, "failed to decode payload: {}", msg)
            }
            Error::Channel(msg) => {
                write!(f, "channel error: {}", msg)
            }
            Error::Shutdown => {
                write!(f, "floodcast node has been shut down")
            }
        }
    }
}

impl std::error::Error for Error {}

impl<T> From<async_channel::SendError<T>> for Error {
    fn from(err: async_channel::SendError<T>) -> Self {
        Error::Channel(err.to_string())
    }
}

impl From<async_channel::RecvError> for Error {
    fn from(err: async_channel::RecvError) -> Self {
        Error::Channel(err.to_string())
    }
}
