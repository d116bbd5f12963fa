//! Single entry point over the compositor, recorder and exporter

use crate::capture::FfmpegCaptureEngine;
use crate::compositor::{
    CompositeSession, FrameCompositor, FrameSource, LayoutConfiguration, OutputStreamHandle,
    TickScheduler,
};
use crate::config::Config;
use crate::export::FileExporter;
use crate::recorder::{Artifact, CaptureEngine, Recorder};
use crate::utils::error::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Compose, record and export using one shared configuration
#[derive(Debug, Clone, Default)]
pub struct Studio {
    config: Config,
}

impl Studio {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocate a surface at the configured size and start compositing
    ///
    /// Falls back to the configured default layout when `layout` is `None`.
    pub fn compose(
        &self,
        sources: Vec<Arc<dyn FrameSource>>,
        layout: Option<LayoutConfiguration>,
        scheduler: Arc<dyn TickScheduler>,
    ) -> AppResult<CompositeSession> {
        let compositor_config = &self.config.compositor;
        let compositor = FrameCompositor::new(
            compositor_config.resolution(),
            compositor_config.frame_rate,
            scheduler,
        )?;
        let layout = layout.unwrap_or(compositor_config.default_layout);
        Ok(compositor.compose(sources, Some(layout))?)
    }

    /// Build a recorder for `engine`, negotiating among the configured formats
    pub fn recorder(&self, engine: Box<dyn CaptureEngine>) -> AppResult<Recorder> {
        let recorder_config = &self.config.recorder;
        let recorder = Recorder::negotiate(engine, &recorder_config.candidate_formats)?
            .with_flush_timeout(recorder_config.flush_timeout());
        Ok(recorder)
    }

    /// FFmpeg engine using the configured binary and read size
    pub fn capture_engine(&self) -> FfmpegCaptureEngine {
        let recorder_config = &self.config.recorder;
        FfmpegCaptureEngine::new(&recorder_config.ffmpeg_path)
            .with_read_buffer_size(recorder_config.read_buffer_size)
    }

    pub fn exporter(&self) -> FileExporter {
        FileExporter::new(&self.config.export.output_dir)
            .with_default_name(&self.config.export.default_name)
    }

    /// Write `artifact` to the output directory, consuming it
    pub fn export(&self, artifact: Artifact, name: Option<&str>) -> AppResult<PathBuf> {
        Ok(self.exporter().export(artifact, name)?)
    }

    /// Save the latest composited frame of `stream` as a PNG
    pub fn snapshot(&self, stream: &OutputStreamHandle, name: &str) -> AppResult<PathBuf> {
        let frame = stream.latest().ok_or(AppError::NoFrame)?;
        Ok(self.exporter().export_snapshot(&frame, name)?)
    }
}
