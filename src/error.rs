use std::io;

use thiserror::Error;

/// Errors surfaced by the collection, storage and inference pipeline.
#[derive(Error, Debug)]
pub enum MotionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to decode session record: {0}")]
    DecodeFailure(String),

    #[error("inference engine is closed")]
    EngineClosed,

    #[error("storage I/O failed: {context}")]
    StorageIo {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("inference engine failed: {0}")]
    EngineFailure(String),

    #[error("analysis unavailable: {0}")]
    AnalysisUnavailable(#[source] Box<MotionError>),
}

/// Fieldless classification of [`MotionError`], for callers that branch on
/// the failure category rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    DecodeFailure,
    EngineClosed,
    StorageIoFailure,
    EngineFailure,
    AnalysisUnavailable,
}

impl MotionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MotionError::InvalidInput(_) => ErrorKind::InvalidInput,
            MotionError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            MotionError::EngineClosed => ErrorKind::EngineClosed,
            MotionError::StorageIo { .. } => ErrorKind::StorageIoFailure,
            MotionError::EngineFailure(_) => ErrorKind::EngineFailure,
            MotionError::AnalysisUnavailable(_) => ErrorKind::AnalysisUnavailable,
        }
    }

    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        MotionError::StorageIo {
            context: context.into(),
            source,
        }
    }
}

pub type MotionResult<T> = Result<T, MotionError>;
