//! Writing recordings and snapshots to disk

use super::snapshot::write_png;
use super::types::{validate_name, ExportResult, FailedExport, DEFAULT_EXPORT_NAME};
use crate::compositor::CompositeFrame;
use crate::recorder::Artifact;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes finalized artifacts into an output directory
#[derive(Debug, Clone)]
pub struct FileExporter {
    output_dir: PathBuf,
    default_name: String,
}

impl FileExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            default_name: DEFAULT_EXPORT_NAME.to_string(),
        }
    }

    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Write `artifact` as `<name>.<ext>` and return the path
    ///
    /// The artifact is consumed once written. On failure it is handed back
    /// inside the [`FailedExport`].
    pub fn export(
        &self,
        artifact: Artifact,
        name: Option<&str>,
    ) -> Result<PathBuf, FailedExport> {
        match self.write_artifact(&artifact, name) {
            Ok(path) => {
                tracing::info!(
                    "Exported {} ({} bytes, {} chunks) to {:?}",
                    artifact.mime_type(),
                    artifact.len(),
                    artifact.chunks().len(),
                    path
                );
                Ok(path)
            }
            Err(error) => {
                tracing::warn!("Failed to export artifact {}: {}", artifact.id(), error);
                Err(FailedExport::new(error, artifact))
            }
        }
    }

    fn write_artifact(&self, artifact: &Artifact, name: Option<&str>) -> ExportResult<PathBuf> {
        let name = validate_name(name.unwrap_or(&self.default_name))?;

        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(artifact.file_name(name));
        fs::write(&path, artifact.bytes())?;
        Ok(path)
    }

    /// Write a composite frame as `<name>.png`
    pub fn export_snapshot(&self, frame: &CompositeFrame, name: &str) -> ExportResult<PathBuf> {
        let name = validate_name(name)?;

        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.png", name));
        write_png(frame, &path)?;
        Ok(path)
    }
}
