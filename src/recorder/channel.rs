//! Capture engine boundary
//!
//! The recorder does not encode anything itself. It drives a
//! [`CaptureEngine`] and receives the engine's output through a
//! [`ChunkSink`], an ordered channel created before the engine is started.

use super::format::ContainerFormat;
use super::state::RecordingState;
use crate::compositor::OutputStreamHandle;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Recording errors
#[derive(Error, Debug)]
pub enum RecordingError {
    /// Operation not allowed in the current state; the state is unchanged
    #[error("Cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: RecordingState,
    },

    #[error("No supported container format among: {0}")]
    FormatNegotiation(String),

    #[error("Capture engine error: {0}")]
    Engine(String),

    #[error("Capture engine did not finish flushing within {0}ms")]
    FlushTimeout(u64),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Notification delivered from the engine to the recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Encoded data, in emission order
    Chunk(Vec<u8>),
    /// No further chunks will follow
    Finished,
}

/// Sending half handed to a capture engine
#[derive(Debug, Clone)]
pub struct ChunkSink {
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl ChunkSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver a chunk; returns false if the recorder is gone
    pub fn push_chunk(&self, bytes: Vec<u8>) -> bool {
        self.tx.send(CaptureEvent::Chunk(bytes)).is_ok()
    }

    /// Signal that the last chunk has been delivered
    pub fn finish(&self) {
        let _ = self.tx.send(CaptureEvent::Finished);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An encoder that turns a composited stream into container chunks
///
/// Contract for `stop`: the engine flushes, pushes any remaining chunks into
/// the sink it was started with, then calls [`ChunkSink::finish`]. Dropping
/// every clone of the sink counts as finishing.
#[async_trait]
pub trait CaptureEngine: Send {
    /// Engine name used in logs
    fn name(&self) -> &str;

    /// Whether the engine can produce this container
    fn is_format_supported(&self, format: ContainerFormat) -> bool;

    /// Begin capturing `stream` into `format`
    async fn start(
        &mut self,
        stream: OutputStreamHandle,
        format: ContainerFormat,
        sink: ChunkSink,
    ) -> RecordingResult<()>;

    /// Stop consuming frames without ending the recording
    async fn pause(&mut self) -> RecordingResult<()>;

    /// Resume consuming frames
    async fn resume(&mut self) -> RecordingResult<()>;

    /// Request a flush; completion is signalled through the sink
    async fn stop(&mut self) -> RecordingResult<()>;
}
