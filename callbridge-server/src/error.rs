use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The connection was closed before the operation could complete.
    #[error("connection is closed")]
    ConnectionClosed,

    #[error("no unique session id after {attempts} attempts")]
    IdentifierExhausted { attempts: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
