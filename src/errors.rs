#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("security error: request method '{0}' is not allowed")]
    Security(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("unsupported method '{method}' for {scheme} scheme")]
    UnsupportedMethod { method: String, scheme: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("sync worker error: {0}")]
    Worker(String),
}
