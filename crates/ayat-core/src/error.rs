//! 统一错误处理

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AyatError {
    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("invalid model type: {0}")]
    InvalidModelType(String),

    #[error("no embedding model available")]
    NoModelAvailable,

    #[error("meta-ranker is not trained")]
    ModelNotTrained,

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("no ground truth for query {0}")]
    NoGroundTruth(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AyatError {
    /// 稳定的错误类别名，用于序列化的评估错误记录
    pub fn kind(&self) -> &'static str {
        match self {
            AyatError::ModelNotLoaded(_) => "model_not_loaded",
            AyatError::InvalidModelType(_) => "invalid_model_type",
            AyatError::NoModelAvailable => "no_model_available",
            AyatError::ModelNotTrained => "model_not_trained",
            AyatError::InsufficientData(_) => "insufficient_data",
            AyatError::NoGroundTruth(_) => "no_ground_truth",
            AyatError::InvalidConfiguration(_) => "invalid_configuration",
            AyatError::Parse(_) => "parse",
            AyatError::Io(_) => "io",
            AyatError::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, AyatError>;
