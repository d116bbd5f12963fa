//! Export error types

use crate::recorder::Artifact;
use std::fmt;
use thiserror::Error;

/// Name used when an export is not given one
pub const DEFAULT_EXPORT_NAME: &str = "recording";

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid export name: {0:?}")]
    InvalidName(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<ExportError> for String {
    fn from(e: ExportError) -> String {
        e.to_string()
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

/// An export that did not complete
///
/// Carries the artifact back to the caller so the recording can be exported
/// again.
#[derive(Error)]
#[error("{error}")]
pub struct FailedExport {
    #[source]
    error: ExportError,
    artifact: Artifact,
}

impl FailedExport {
    pub(crate) fn new(error: ExportError, artifact: Artifact) -> Self {
        Self { error, artifact }
    }

    pub fn error(&self) -> &ExportError {
        &self.error
    }

    pub fn into_artifact(self) -> Artifact {
        self.artifact
    }
}

impl fmt::Debug for FailedExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailedExport")
            .field("error", &self.error)
            .field("artifact", &self.artifact.id())
            .field("bytes", &self.artifact.len())
            .finish()
    }
}

/// Check that `name` is usable as a bare file stem
pub fn validate_name(name: &str) -> ExportResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
        || trimmed.contains('\0')
    {
        return Err(ExportError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("demo").unwrap(), "demo");
        assert_eq!(validate_name("  take 2 ").unwrap(), "take 2");

        for bad in ["", "   ", ".", "..", "a/b", "..\\evil", "nul\0"] {
            assert!(
                matches!(validate_name(bad), Err(ExportError::InvalidName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
