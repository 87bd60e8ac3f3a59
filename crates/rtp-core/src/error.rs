use thiserror::Error;

/// Error type for RTP transport operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid parameter for a transport component
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
