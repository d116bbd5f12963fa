//! Recording state management
//!
//! Defines the recording state machine, the per-session chunk buffer and the
//! finalized artifact.

use super::format::ContainerFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of a recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording started yet
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
    /// Recording finalized; the recorder cannot be reused
    Stopped,
}

impl RecordingState {
    pub fn can_start(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }

    pub fn can_pause(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }

    pub fn can_resume(&self) -> bool {
        matches!(self, RecordingState::Paused)
    }

    pub fn can_stop(&self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Paused)
    }
}

/// One uninterrupted stretch of recording
///
/// A new segment starts on `start` and on every `resume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSegment {
    /// Segment index (0, 1, 2, ...)
    pub index: usize,

    /// Duration of this segment in milliseconds
    pub duration_ms: f64,

    /// Process time when the segment started (relative to recording start)
    pub process_time_start_ms: f64,

    /// Process time when the segment ended
    pub process_time_end_ms: f64,

    /// Unix timestamp when the segment started
    pub unix_start_ms: u64,

    /// Unix timestamp when the segment ended
    pub unix_end_ms: u64,
}

impl RecordingSegment {
    /// Create a new segment starting now
    pub fn new(index: usize, process_time_ms: f64) -> Self {
        let now = Utc::now().timestamp_millis() as u64;
        Self {
            index,
            duration_ms: 0.0,
            process_time_start_ms: process_time_ms,
            process_time_end_ms: process_time_ms,
            unix_start_ms: now,
            unix_end_ms: now,
        }
    }

    /// End the segment
    pub fn end(&mut self, process_time_ms: f64) {
        self.process_time_end_ms = process_time_ms;
        self.duration_ms = self.process_time_end_ms - self.process_time_start_ms;
        self.unix_end_ms = Utc::now().timestamp_millis() as u64;
    }
}

/// One unit of encoded data emitted by the capture engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence: u64,
    pub bytes: Vec<u8>,
}

impl Chunk {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Position and size of a chunk inside a finalized artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub sequence: u64,
    pub size: usize,
}

/// Chunks accepted during one session, in arrival order
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Chunk>,
    total_bytes: usize,
    discarded: u64,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, returning its sequence number
    ///
    /// Empty chunks are discarded and get no sequence number.
    pub fn push(&mut self, bytes: Vec<u8>) -> Option<u64> {
        if bytes.is_empty() {
            self.discarded += 1;
            return None;
        }
        let sequence = self.chunks.len() as u64;
        self.total_bytes += bytes.len();
        self.chunks.push(Chunk { sequence, bytes });
        Some(sequence)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Number of empty chunks dropped
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Concatenate every chunk, in order, into one artifact
    pub fn finalize(self, format: ContainerFormat, duration_ms: f64) -> Artifact {
        let mut bytes = Vec::with_capacity(self.total_bytes);
        let mut chunks = Vec::with_capacity(self.chunks.len());
        for chunk in self.chunks {
            chunks.push(ChunkInfo {
                sequence: chunk.sequence,
                size: chunk.size(),
            });
            bytes.extend_from_slice(&chunk.bytes);
        }

        Artifact {
            id: Uuid::new_v4(),
            format,
            chunks,
            bytes,
            created_at: Utc::now(),
            duration_ms,
        }
    }
}

/// Finalized recording
///
/// Immutable. Handed to an exporter by value, which releases it once the
/// export has consumed it.
#[derive(Debug)]
pub struct Artifact {
    id: Uuid,
    format: ContainerFormat,
    chunks: Vec<ChunkInfo>,
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
    duration_ms: f64,
}

impl Artifact {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// The chunks the artifact was assembled from, in order
    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Total recorded time, excluding pauses
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// `<name>.<extension>` for this artifact's container
    pub fn file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.format.extension())
    }
}
