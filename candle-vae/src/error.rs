use thiserror::Error;

pub type VaeResult<T> = Result<T, VaeError>;

/// Errors raised by the VAE core
#[derive(Debug, Error)]
pub enum VaeError {
    /// image batch disagrees with the configured `[N, C, H, W]` shape
    #[error("image shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// latent width disagrees between encoder, sampler and decoder
    #[error("latent dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// loss became NaN or infinite; the optimizer step was not taken
    #[error("non-finite loss {value} at epoch {epoch}, minibatch {batch}")]
    NumericInstability {
        epoch: usize,
        batch: usize,
        value: f32,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaeError {
    pub fn shape_mismatch(expected: impl std::fmt::Debug, got: impl std::fmt::Debug) -> Self {
        Self::ShapeMismatch {
            expected: format!("{:?}", expected),
            got: format!("{:?}", got),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }
}
