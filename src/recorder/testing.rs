//! Scripted capture engine used by recorder tests

use super::channel::{CaptureEngine, ChunkSink, RecordingError, RecordingResult};
use super::format::ContainerFormat;
use crate::compositor::OutputStreamHandle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct Script {
    /// Engine calls, in order
    pub calls: Vec<&'static str>,
    pub sink: Option<ChunkSink>,
    pub format: Option<ContainerFormat>,
    /// Chunks pushed as soon as the engine starts
    pub start_chunks: Vec<Vec<u8>>,
    /// Chunks pushed while flushing on stop
    pub flush_chunks: Vec<Vec<u8>>,
    /// Whether stop signals completion at all
    pub finish_on_stop: bool,
    /// Flush from a background task after this delay
    pub flush_delay: Option<Duration>,
    /// Operation that returns an error
    pub fail_on: Option<&'static str>,
}

impl Script {
    /// Simulate a chunk arriving from the engine
    pub fn emit(&self, bytes: &[u8]) {
        if let Some(sink) = &self.sink {
            sink.push_chunk(bytes.to_vec());
        }
    }
}

pub(crate) struct ScriptedEngine {
    supported: Vec<ContainerFormat>,
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    pub fn supporting(formats: &[ContainerFormat]) -> Self {
        Self {
            supported: formats.to_vec(),
            script: Arc::new(Mutex::new(Script {
                calls: Vec::new(),
                sink: None,
                format: None,
                start_chunks: Vec::new(),
                flush_chunks: Vec::new(),
                finish_on_stop: true,
                flush_delay: None,
                fail_on: None,
            })),
        }
    }

    pub fn script(&self) -> Arc<Mutex<Script>> {
        self.script.clone()
    }

    fn call(&self, op: &'static str) -> RecordingResult<()> {
        let mut script = self.script.lock();
        script.calls.push(op);
        if script.fail_on == Some(op) {
            return Err(RecordingError::Engine(format!("scripted {} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl CaptureEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_format_supported(&self, format: ContainerFormat) -> bool {
        self.supported.contains(&format)
    }

    async fn start(
        &mut self,
        _stream: OutputStreamHandle,
        format: ContainerFormat,
        sink: ChunkSink,
    ) -> RecordingResult<()> {
        self.call("start")?;
        let mut script = self.script.lock();
        for chunk in std::mem::take(&mut script.start_chunks) {
            sink.push_chunk(chunk);
        }
        script.sink = Some(sink);
        script.format = Some(format);
        Ok(())
    }

    async fn pause(&mut self) -> RecordingResult<()> {
        self.call("pause")
    }

    async fn resume(&mut self) -> RecordingResult<()> {
        self.call("resume")
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        self.call("stop")?;
        let mut script = self.script.lock();
        if !script.finish_on_stop {
            return Ok(());
        }

        let Some(sink) = script.sink.take() else {
            return Ok(());
        };
        let chunks = std::mem::take(&mut script.flush_chunks);

        match script.flush_delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for chunk in chunks {
                        sink.push_chunk(chunk);
                    }
                    sink.finish();
                });
            }
            None => {
                for chunk in chunks {
                    sink.push_chunk(chunk);
                }
                sink.finish();
            }
        }
        Ok(())
    }
}
