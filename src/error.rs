//! Error types for jobq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The payload or envelope could not be serialized.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Popped bytes are not a valid job envelope. The bytes are already
    /// gone from the store.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The queue has no pending jobs. Not a failure.
    #[error("queue is empty")]
    EmptyQueue,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("corrupt counter {field}: {value:?} is not a number")]
    CorruptCounter { field: String, value: String },

    #[error("handler error: {0}")]
    Handler(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_empty_queue(&self) -> bool {
        matches!(self, Error::EmptyQueue)
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
