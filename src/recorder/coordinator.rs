//! Recording coordinator
//!
//! Drives a capture engine through the recording lifecycle and assembles the
//! chunks it emits into a single artifact.

use super::channel::{CaptureEngine, CaptureEvent, ChunkSink, RecordingError, RecordingResult};
use super::format::{negotiate_format, ContainerFormat};
use super::state::{Artifact, ChunkBuffer, RecordingSegment, RecordingState};
use crate::compositor::OutputStreamHandle;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    StateChanged {
        from: RecordingState,
        to: RecordingState,
    },
    /// A chunk was appended to the session
    ChunkAccepted { sequence: u64, size: usize },
    /// An empty chunk was dropped
    ChunkDiscarded,
    /// The engine signalled that no more chunks will arrive
    EngineFinished,
    /// The artifact was assembled
    Finalized {
        size: usize,
        format: ContainerFormat,
    },
}

/// Per-session state, owned exclusively by the recorder
struct ActiveSession {
    events: mpsc::UnboundedReceiver<CaptureEvent>,
    chunks: ChunkBuffer,
    engine_finished: bool,
    stop_requested: bool,
}

impl ActiveSession {
    fn apply(&mut self, event: CaptureEvent, event_tx: &broadcast::Sender<RecorderEvent>) {
        match event {
            CaptureEvent::Chunk(bytes) => {
                if self.engine_finished {
                    tracing::warn!("Ignoring {} byte chunk received after finish", bytes.len());
                    return;
                }
                let size = bytes.len();
                match self.chunks.push(bytes) {
                    Some(sequence) => {
                        tracing::trace!("Chunk {} accepted ({} bytes)", sequence, size);
                        let _ = event_tx.send(RecorderEvent::ChunkAccepted { sequence, size });
                    }
                    None => {
                        tracing::debug!("Discarding empty chunk");
                        let _ = event_tx.send(RecorderEvent::ChunkDiscarded);
                    }
                }
            }
            CaptureEvent::Finished => {
                if !self.engine_finished {
                    self.engine_finished = true;
                    let _ = event_tx.send(RecorderEvent::EngineFinished);
                }
            }
        }
    }

    /// Receive until the engine signals completion or drops its sink
    async fn wait_finished(&mut self, event_tx: &broadcast::Sender<RecorderEvent>) {
        while !self.engine_finished {
            match self.events.recv().await {
                Some(event) => self.apply(event, event_tx),
                None => {
                    tracing::warn!("Capture engine dropped its sink without finishing");
                    self.engine_finished = true;
                }
            }
        }
    }
}

/// Records one output stream into one artifact
///
/// A recorder carries exactly one session through
/// `Idle -> Recording <-> Paused -> Stopped` and cannot be restarted.
pub struct Recorder {
    engine: Box<dyn CaptureEngine>,
    format: ContainerFormat,
    state: RecordingState,
    session: Option<ActiveSession>,

    /// Segments (one per start/resume)
    segments: Vec<RecordingSegment>,

    /// Time when recording started (for process time calculation)
    start_time: Option<Instant>,

    flush_timeout: Option<Duration>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("engine", &self.engine.name())
            .field("format", &self.format)
            .field("state", &self.state)
            .field("segments", &self.segments.len())
            .field("chunks", &self.chunk_count())
            .finish()
    }
}

impl Recorder {
    /// Negotiate a container format with `engine` and build a recorder
    ///
    /// Fails with [`RecordingError::FormatNegotiation`] if no candidate is
    /// supported.
    pub fn negotiate(
        engine: Box<dyn CaptureEngine>,
        candidates: &[ContainerFormat],
    ) -> RecordingResult<Self> {
        let format = negotiate_format(candidates, engine.as_ref())?;
        Ok(Self::with_format(engine, format))
    }

    /// Build a recorder with an already negotiated format
    pub fn with_format(engine: Box<dyn CaptureEngine>, format: ContainerFormat) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            engine,
            format,
            state: RecordingState::Idle,
            session: None,
            segments: Vec::new(),
            start_time: None,
            flush_timeout: None,
            event_tx,
        }
    }

    /// Bound how long `stop` waits for the engine to flush
    pub fn with_flush_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    pub fn segments(&self) -> &[RecordingSegment] {
        &self.segments
    }

    /// Chunks accepted so far in the active session
    pub fn chunk_count(&self) -> usize {
        self.session.as_ref().map(|s| s.chunks.len()).unwrap_or(0)
    }

    /// Bytes accepted so far in the active session
    pub fn recorded_bytes(&self) -> usize {
        self.session.as_ref().map(|s| s.chunks.total_bytes()).unwrap_or(0)
    }

    /// Get the current process time in milliseconds
    fn process_time_ms(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    /// Recorded time in milliseconds, excluding pauses
    pub fn duration_ms(&self) -> f64 {
        let completed: f64 = self
            .segments
            .iter()
            .take(self.segments.len().saturating_sub(1))
            .map(|s| s.duration_ms)
            .sum();

        let current = if self.state == RecordingState::Recording {
            self.segments
                .last()
                .map(|s| self.process_time_ms() - s.process_time_start_ms)
                .unwrap_or(0.0)
        } else {
            self.segments.last().map(|s| s.duration_ms).unwrap_or(0.0)
        };

        completed + current
    }

    /// Apply every event that has already arrived, without waiting
    ///
    /// Returns the number of events applied.
    pub fn collect_pending(&mut self) -> usize {
        let Some(session) = self.session.as_mut() else {
            return 0;
        };

        let was_finished = session.engine_finished;
        let mut applied = 0;
        loop {
            match session.events.try_recv() {
                Ok(event) => {
                    session.apply(event, &self.event_tx);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !session.engine_finished {
                        tracing::warn!("Capture engine dropped its sink without finishing");
                        session.engine_finished = true;
                    }
                    break;
                }
            }
        }

        if !was_finished && session.engine_finished && !session.stop_requested {
            tracing::warn!(
                "{} finished before stop was requested; waiting for stop to finalize",
                self.engine.name()
            );
        }

        applied
    }

    fn invalid(&self, operation: &'static str) -> RecordingError {
        RecordingError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn transition(&mut self, to: RecordingState) {
        let from = self.state;
        self.state = to;
        tracing::debug!("Recorder state {:?} -> {:?}", from, to);
        let _ = self.event_tx.send(RecorderEvent::StateChanged { from, to });
    }

    /// Start recording `stream`
    ///
    /// The chunk sink is created before the engine starts, so chunks emitted
    /// during start-up are kept.
    pub async fn start(&mut self, stream: OutputStreamHandle) -> RecordingResult<()> {
        if !self.state.can_start() {
            return Err(self.invalid("start"));
        }

        let (sink, events) = ChunkSink::channel();
        self.session = Some(ActiveSession {
            events,
            chunks: ChunkBuffer::new(),
            engine_finished: false,
            stop_requested: false,
        });

        tracing::info!(
            "Starting recording with {} as {} ({}x{})",
            self.engine.name(),
            self.format,
            stream.resolution().width,
            stream.resolution().height
        );

        if let Err(e) = self.engine.start(stream, self.format, sink).await {
            tracing::error!("Failed to start {}: {}", self.engine.name(), e);
            self.session = None;
            return Err(e);
        }

        self.start_time = Some(Instant::now());
        self.segments = vec![RecordingSegment::new(0, 0.0)];
        self.transition(RecordingState::Recording);

        tracing::info!("Recording started");
        Ok(())
    }

    /// Pause recording
    pub async fn pause(&mut self) -> RecordingResult<()> {
        self.collect_pending();
        if !self.state.can_pause() {
            return Err(self.invalid("pause"));
        }

        tracing::info!("Pausing recording");
        self.engine.pause().await?;

        let end_time = self.process_time_ms();
        if let Some(segment) = self.segments.last_mut() {
            segment.end(end_time);
        }

        self.transition(RecordingState::Paused);
        Ok(())
    }

    /// Resume recording
    pub async fn resume(&mut self) -> RecordingResult<()> {
        self.collect_pending();
        if !self.state.can_resume() {
            return Err(self.invalid("resume"));
        }

        tracing::info!("Resuming recording");
        self.engine.resume().await?;

        let segment = RecordingSegment::new(self.segments.len(), self.process_time_ms());
        self.segments.push(segment);

        self.transition(RecordingState::Recording);
        Ok(())
    }

    /// Stop recording and assemble the artifact
    ///
    /// The artifact is built only after the engine has signalled that its
    /// last chunk was delivered.
    pub async fn stop(&mut self) -> RecordingResult<Artifact> {
        self.collect_pending();
        if !self.state.can_stop() {
            return Err(self.invalid("stop"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RecordingError::Engine("active state without a session".to_string()))?;

        if !session.stop_requested {
            tracing::info!("Stopping recording");
            self.engine.stop().await?;
            session.stop_requested = true;
        }

        let wait = session.wait_finished(&self.event_tx);
        match self.flush_timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, wait).await.is_err() {
                    tracing::warn!(
                        "{} did not finish flushing within {:?}",
                        self.engine.name(),
                        timeout
                    );
                    return Err(RecordingError::FlushTimeout(timeout.as_millis() as u64));
                }
            }
            None => wait.await,
        }

        if self.state == RecordingState::Recording {
            let end_time = self.process_time_ms();
            if let Some(segment) = self.segments.last_mut() {
                segment.end(end_time);
            }
        }

        let session = self
            .session
            .take()
            .ok_or_else(|| RecordingError::Engine("session vanished while stopping".to_string()))?;
        let duration_ms: f64 = self.segments.iter().map(|s| s.duration_ms).sum();
        let discarded = session.chunks.discarded();
        let artifact = session.chunks.finalize(self.format, duration_ms);

        self.transition(RecordingState::Stopped);
        let _ = self.event_tx.send(RecorderEvent::Finalized {
            size: artifact.len(),
            format: artifact.format(),
        });

        tracing::info!(
            "Recording stopped: {} chunks, {} bytes, {} empty chunks dropped, {:.0}ms",
            artifact.chunks().len(),
            artifact.len(),
            discarded,
            duration_ms
        );
        Ok(artifact)
    }
}
