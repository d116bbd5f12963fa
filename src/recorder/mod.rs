//! Recording system module
//!
//! This module records a composited stream into a single artifact:
//! - CaptureEngine trait for the external encoder
//! - Container format negotiation
//! - Recorder state machine and chunk assembly

pub mod channel;
pub mod coordinator;
pub mod format;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{CaptureEngine, CaptureEvent, ChunkSink, RecordingError, RecordingResult};
pub use coordinator::{Recorder, RecorderEvent};
pub use format::{negotiate_format, ContainerFormat, DEFAULT_CANDIDATES};
pub use state::{Artifact, Chunk, ChunkBuffer, ChunkInfo, RecordingSegment, RecordingState};
