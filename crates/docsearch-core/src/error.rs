use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The index holds no records yet, so a query cannot be answered.
    #[error("Vector index is not initialized")]
    NotInitialized,

    #[error("Corrupt index snapshot: {0}")]
    Corrupt(String),

    /// Connectivity or authentication failure talking to a gateway.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A gateway answered with a shape we cannot use.
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error came from an embedding or rerank gateway.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_) | Error::MalformedUpstreamResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
