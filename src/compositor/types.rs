//! Compositor types
//!
//! Errors, per-tick reports and running statistics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compositor errors
#[derive(Error, Debug)]
pub enum CompositorError {
    /// The output surface could not be created. Fatal, never retried.
    #[error("Surface allocation failed: {0}")]
    SurfaceAllocation(String),

    #[error("No sources to compose")]
    NoSources,

    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

/// Failure while drawing a single frame onto the surface
///
/// These are absorbed by the tick loop and only ever logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Frame size mismatch: got {actual} bytes, expected {expected} ({width}x{height}x4)")]
    FrameSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Destination {x},{y} {width}x{height} lies outside the surface")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Published frame sequence number
    pub sequence: u64,
    /// Sources drawn onto the surface
    pub drawn: usize,
    /// Sources skipped because no frame was ready
    pub skipped: usize,
    /// Sources whose draw failed
    pub failed: usize,
}

/// Running totals for a compositing session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositorStats {
    pub ticks: u64,
    pub frames_published: u64,
    pub sources_skipped: u64,
    pub render_failures: u64,
}

impl CompositorStats {
    pub(crate) fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.frames_published += 1;
        self.sources_skipped += report.skipped as u64;
        self.render_failures += report.failed as u64;
    }
}
