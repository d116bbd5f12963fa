//! FFmpeg capture engine
//!
//! Pipes raw RGBA composite frames into an FFmpeg process and forwards the
//! container bytes it writes to stdout as recording chunks.

use crate::compositor::{OutputStreamHandle, Resolution};
use crate::recorder::{CaptureEngine, ChunkSink, ContainerFormat, RecordingError, RecordingResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Default size of each stdout read, and so the largest chunk emitted
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Capture engine backed by an FFmpeg child process
pub struct FfmpegCaptureEngine {
    ffmpeg_path: PathBuf,
    read_buffer_size: usize,
    /// Cached output of `ffmpeg -muxers` / `ffmpeg -encoders`
    probes: Mutex<HashMap<&'static str, String>>,
    running: Option<RunningCapture>,
}

struct RunningCapture {
    paused: Arc<AtomicBool>,
    frames_written: Arc<AtomicU64>,
    stop_tx: Option<oneshot::Sender<()>>,
    writer: Option<JoinHandle<()>>,
}

impl FfmpegCaptureEngine {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            probes: Mutex::new(HashMap::new()),
            running: None,
        }
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Frames written to FFmpeg in the current capture
    pub fn frames_written(&self) -> u64 {
        self.running
            .as_ref()
            .map(|r| r.frames_written.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Run `ffmpeg -hide_banner <flag>` once and cache its output
    fn probe(&self, flag: &'static str) -> String {
        let mut probes = self.probes.lock();
        if let Some(output) = probes.get(flag) {
            return output.clone();
        }

        let output = match std::process::Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", flag])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => String::from_utf8_lossy(&output.stdout).to_string(),
            Err(e) => {
                tracing::warn!("Failed to run {:?} {}: {}", self.ffmpeg_path, flag, e);
                String::new()
            }
        };

        probes.insert(flag, output.clone());
        output
    }
}

impl Default for FfmpegCaptureEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Lines of an ffmpeg listing after the legend's `--` separator
fn listing_entries(listing: &str) -> impl Iterator<Item = &str> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("--"))
        .skip(1)
}

/// Check an `ffmpeg -muxers` listing for a muxer that can write `name`
fn lists_muxer(listing: &str, name: &str) -> bool {
    listing_entries(listing).any(|line| {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(flags), Some(names)) => {
                flags.contains('E') && names.split(',').any(|n| n == name)
            }
            _ => false,
        }
    })
}

/// Check an `ffmpeg -encoders` listing for a video encoder called `name`
fn lists_encoder(listing: &str, name: &str) -> bool {
    listing_entries(listing).any(|line| {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(flags), Some(encoder)) => flags.starts_with('V') && encoder == name,
            _ => false,
        }
    })
}

/// Encoder arguments for a streamable container on stdout
fn codec_args(format: ContainerFormat) -> Vec<String> {
    let tuning: &[&str] = match format {
        ContainerFormat::Webm => &[
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-crf",
            "32",
            "-b:v",
            "0",
        ],
        ContainerFormat::Ogg => &["-q:v", "7"],
        // A seekable moov atom is impossible on a pipe
        ContainerFormat::Mp4 => &[
            "-preset",
            "veryfast",
            "-crf",
            "23",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "frag_keyframe+empty_moov+default_base_moof",
        ],
    };

    let mut args = vec!["-c:v".to_string(), format.video_codec().to_string()];
    args.extend(tuning.iter().map(|s| s.to_string()));
    args
}

/// Full FFmpeg argument list: raw RGBA on stdin, container on stdout
fn build_args(format: ContainerFormat, resolution: Resolution, frame_rate: u32) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", resolution.width, resolution.height),
        "-r".to_string(),
        frame_rate.max(1).to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-an".to_string(),
    ];
    args.extend(codec_args(format));
    args.extend([
        "-f".to_string(),
        format.muxer().to_string(),
        "pipe:1".to_string(),
    ]);
    args
}

#[async_trait]
impl CaptureEngine for FfmpegCaptureEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_format_supported(&self, format: ContainerFormat) -> bool {
        lists_muxer(&self.probe("-muxers"), format.muxer())
            && lists_encoder(&self.probe("-encoders"), format.video_codec())
    }

    async fn start(
        &mut self,
        stream: OutputStreamHandle,
        format: ContainerFormat,
        sink: ChunkSink,
    ) -> RecordingResult<()> {
        if self.running.is_some() {
            return Err(RecordingError::Engine("FFmpeg capture already running".to_string()));
        }

        let resolution = stream.resolution();
        let args = build_args(format, resolution, stream.frame_rate());
        tracing::info!("Starting FFmpeg capture: {:?}", args);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecordingError::Engine(format!("Failed to start FFmpeg: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecordingError::Engine("Failed to capture FFmpeg stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecordingError::Engine("Failed to capture FFmpeg stdout".to_string()))?;
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        let paused = Arc::new(AtomicBool::new(false));
        let frames_written = Arc::new(AtomicU64::new(0));
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::spawn(forward_output(child, stdout, stderr, sink, self.read_buffer_size));
        let writer = tokio::spawn(feed_frames(
            stream,
            stdin,
            paused.clone(),
            frames_written.clone(),
            stop_rx,
        ));

        self.running = Some(RunningCapture {
            paused,
            frames_written,
            stop_tx: Some(stop_tx),
            writer: Some(writer),
        });
        Ok(())
    }

    async fn pause(&mut self) -> RecordingResult<()> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| RecordingError::Engine("FFmpeg capture not running".to_string()))?;
        running.paused.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn resume(&mut self) -> RecordingResult<()> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| RecordingError::Engine("FFmpeg capture not running".to_string()))?;
        running.paused.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        let mut running = self
            .running
            .take()
            .ok_or_else(|| RecordingError::Engine("FFmpeg capture not running".to_string()))?;

        if let Some(stop_tx) = running.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        // Once the writer exits stdin is closed and FFmpeg flushes
        if let Some(writer) = running.writer.take() {
            if let Err(e) = writer.await {
                tracing::warn!("FFmpeg frame writer ended abnormally: {}", e);
            }
        }

        tracing::info!(
            "FFmpeg capture stopping after {} frames",
            running.frames_written.load(Ordering::Relaxed)
        );
        Ok(())
    }
}

/// Write every new composite frame to FFmpeg's stdin until told to stop
async fn feed_frames(
    mut stream: OutputStreamHandle,
    mut stdin: ChildStdin,
    paused: Arc<AtomicBool>,
    frames_written: Arc<AtomicU64>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let expected = stream.resolution().rgba_len();

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            frame = stream.next_frame() => {
                let Some(frame) = frame else {
                    tracing::info!("Composite stream ended");
                    break;
                };
                if paused.load(Ordering::Relaxed) {
                    continue;
                }
                if Some(frame.pixels.len()) != expected {
                    tracing::warn!(
                        "Skipping frame {}: {} bytes does not match stream resolution",
                        frame.sequence,
                        frame.pixels.len()
                    );
                    continue;
                }
                if let Err(e) = stdin.write_all(&frame.pixels).await {
                    tracing::error!("Failed to write frame to FFmpeg: {}", e);
                    break;
                }
                frames_written.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    if let Err(e) = stdin.shutdown().await {
        tracing::debug!("Closing FFmpeg stdin: {}", e);
    }
}

/// Forward FFmpeg's stdout as chunks, then signal completion
async fn forward_output(
    mut child: Child,
    mut stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    sink: ChunkSink,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                total += n as u64;
                if !sink.push_chunk(buf[..n].to_vec()) {
                    tracing::warn!("Recorder went away; discarding FFmpeg output");
                }
            }
            Err(e) => {
                tracing::error!("Failed to read FFmpeg output: {}", e);
                break;
            }
        }
    }

    let stderr = match stderr {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    match child.wait().await {
        Ok(status) if status.success() => {
            tracing::info!("FFmpeg capture finished: {} bytes", total);
        }
        Ok(status) => {
            tracing::warn!("FFmpeg exited with status {}: {}", status, stderr.trim());
        }
        Err(e) => {
            tracing::error!("Failed to wait for FFmpeg: {}", e);
        }
    }

    sink.finish();
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUXERS: &str = " File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
  E mp4             MP4 (MPEG-4 Part 14)
  E ogg             Ogg
 DE matroska,webm   Matroska
";

    const ENCODERS: &str = " Encoders:
 ------
 V....D libx264              libx264 H.264 / AVC
 V....D libvpx-vp9           libvpx VP9
 A....D libvorbis            libvorbis
";

    #[test]
    fn test_muxer_listing() {
        assert!(lists_muxer(MUXERS, "mp4"));
        assert!(lists_muxer(MUXERS, "webm"));
        assert!(lists_muxer(MUXERS, "ogg"));
        assert!(!lists_muxer(MUXERS, "gif"));
        // Legend lines never match
        assert!(!lists_muxer(MUXERS, "="));
        assert!(!lists_muxer("  E webm  WebM", "webm"));
    }

    #[test]
    fn test_encoder_listing() {
        assert!(lists_encoder(ENCODERS, "libx264"));
        assert!(lists_encoder(ENCODERS, "libvpx-vp9"));
        assert!(!lists_encoder(ENCODERS, "libtheora"));
        assert!(!lists_encoder(ENCODERS, "libvorbis"));
    }

    #[test]
    fn test_build_args_mp4_is_streamable() {
        let args = build_args(ContainerFormat::Mp4, Resolution::FULL_HD, 30);
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 1920x1080 -r 30 -i -"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("empty_moov"));
        assert!(joined.ends_with("-f mp4 pipe:1"));
    }

    #[test]
    fn test_build_args_webm() {
        let args = build_args(ContainerFormat::Webm, Resolution::new(640, 360), 0);
        let joined = args.join(" ");
        assert!(joined.contains("-s 640x360 -r 1"));
        assert!(joined.contains("-c:v libvpx-vp9"));
        assert!(joined.ends_with("-f webm pipe:1"));
    }

    #[test]
    fn test_missing_binary_supports_nothing() {
        let engine = FfmpegCaptureEngine::new("/nonexistent/ffmpeg-binary");
        for format in crate::recorder::DEFAULT_CANDIDATES {
            assert!(!engine.is_format_supported(format));
        }
    }

    #[tokio::test]
    async fn test_pause_before_start_fails() {
        let mut engine = FfmpegCaptureEngine::default();
        assert!(matches!(engine.pause().await, Err(RecordingError::Engine(_))));
        assert!(matches!(engine.stop().await, Err(RecordingError::Engine(_))));
        assert_eq!(engine.frames_written(), 0);
    }
}
