// error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Array shape error: cannot add bias of shape {bias:?} to value of shape {value:?}")]
    ArrayShape {
        value: Vec<usize>,
        bias: Vec<usize>,
    },

    #[error("Structural conflict: `{key}` is used both as a metric and as a group prefix")]
    StructuralConflict { key: String },

    #[error("Invalid metric key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MetricsError {
    pub fn shape_mismatch(value: &[usize], bias: &[usize]) -> Self {
        MetricsError::ArrayShape {
            value: value.to_vec(),
            bias: bias.to_vec(),
        }
    }
}
