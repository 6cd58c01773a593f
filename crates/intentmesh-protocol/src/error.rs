use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unsupported intent type: {0}")]
    UnsupportedIntentType(String),

    #[error("invalid swap parameter {field}: {reason}")]
    InvalidSwapParam {
        field: &'static str,
        reason: String,
    },

    #[error("frame too large: {size} bytes exceeds {limit}")]
    FrameTooLarge { size: usize, limit: usize },
}
