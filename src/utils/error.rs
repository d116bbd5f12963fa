//! Error types and handling
//!
//! Common error types used across the crate.

use crate::compositor::CompositorError;
use crate::config::ConfigError;
use crate::export::{ExportError, FailedExport};
use crate::recorder::{Artifact, RecordingError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Compositor error: {0}")]
    Compositor(#[from] CompositorError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Export failed; the artifact can be recovered with [`AppError::into_artifact`]
    #[error("Export error: {0}")]
    ExportFailed(#[from] FailedExport),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("No frame has been composited yet")]
    NoFrame,
}

impl AppError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Compositor(e) => match e {
                CompositorError::SurfaceAllocation(_) => "SURFACE_ALLOCATION",
                CompositorError::NoSources => "NO_SOURCES",
                CompositorError::NoRuntime(_) => "NO_RUNTIME",
            },
            AppError::Recording(e) => match e {
                RecordingError::InvalidState { .. } => "SESSION_STATE",
                RecordingError::FormatNegotiation(_) => "FORMAT_NEGOTIATION",
                RecordingError::Engine(_) => "ENGINE_ERROR",
                RecordingError::FlushTimeout(_) => "FLUSH_TIMEOUT",
            },
            AppError::Export(e) => export_code(e),
            AppError::ExportFailed(failed) => export_code(failed.error()),
            AppError::Config(e) => match e {
                ConfigError::Io(_) => "IO_ERROR",
                ConfigError::Parse(_) => "CONFIG_PARSE",
            },
            AppError::NoFrame => "NO_FRAME",
        }
    }

    /// The recording carried by a failed export, if any
    pub fn into_artifact(self) -> Option<Artifact> {
        match self {
            AppError::ExportFailed(failed) => Some(failed.into_artifact()),
            _ => None,
        }
    }
}

fn export_code(error: &ExportError) -> &'static str {
    match error {
        ExportError::Io(_) => "IO_ERROR",
        ExportError::InvalidName(_) => "INVALID_NAME",
        ExportError::Encoding(_) => "ENCODING_ERROR",
    }
}

/// Error response for callers that want a serializable error
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
