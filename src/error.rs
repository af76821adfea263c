use ndarray::ShapeError;
use thiserror::Error;

/// Errors raised while configuring or running a decode.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid decoding configuration: {0}")]
    InvalidConfig(String),

    #[error("CTC posterior shape mismatch: expected {expected:?}, got {actual:?}")]
    PosteriorShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Decoder output has {actual} columns, expected vocabulary size {expected}")]
    VocabMismatch { expected: usize, actual: usize },

    #[error("Unsupported decoding mode: {0}")]
    Unsupported(&'static str),

    #[error("CTC weight is positive but no CTC head was supplied")]
    MissingCtcHead,

    #[error("Model collaborator failed: {0}")]
    Collaborator(String),

    #[error("ndarray shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Failed to start scoring workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) | Self::Json(_) => {
                "The decoding settings are invalid. Check the beam and weight options."
            }
            Self::Unsupported(_) => "This combination of decoding options is not supported.",
            Self::MissingCtcHead => "CTC scoring was requested but the model has no CTC output.",
            Self::PosteriorShape { .. } | Self::VocabMismatch { .. } | Self::Shape(_) => {
                "The model produced output of an unexpected size."
            }
            Self::Collaborator(_) => "The speech model failed while decoding.",
            Self::ThreadPool(_) => "Could not start the decoding worker threads.",
            Self::Io(_) => "Could not read the decoding resources from disk.",
        }
    }
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;
