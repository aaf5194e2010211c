use thiserror::Error;

/// Errors produced by the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An error reply sent by the server, e.g. `ERR unknown command`.
    #[error("Server error: {0}")]
    Response(String),

    /// A `WRONGTYPE` reply: the key holds a value of another type.
    #[error("Wrong type: {0}")]
    WrongType(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Pool is already closed")]
    PoolClosed,

    #[error("Pool is already closing")]
    PoolClosing,

    #[error("Pool is not closing")]
    PoolNotClosing,

    /// EXEC returned nil: one of the watched keys changed before the
    /// transaction committed.
    #[error("Watched keys modified: {}", keys.join(", "))]
    WatchConflict { keys: Vec<String> },

    #[error("Key does not exist: {0}")]
    InvalidKey(String),

    #[error("Key has no associated expiry: {0}")]
    NoExpiry(String),

    /// A reply could not be converted into the requested type.
    #[error("Expected {expected} reply, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

impl Error {
    /// Classify an error reply by its leading code word.
    pub(crate) fn from_server(message: String) -> Self {
        if message.starts_with("WRONGTYPE") {
            let detail = message.trim_start_matches("WRONGTYPE").trim_start();
            Error::WrongType(detail.to_string())
        } else {
            Error::Response(message)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
