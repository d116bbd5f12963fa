//! Container format negotiation
//!
//! The container is chosen once, before a recorder is built, as the first
//! candidate the capture engine reports as supported.

use super::channel::{CaptureEngine, RecordingError, RecordingResult};
use serde::{Deserialize, Serialize};

/// Envelope format of the recorded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Webm,
    Ogg,
    Mp4,
}

/// Preference order used when nothing else is configured
pub const DEFAULT_CANDIDATES: [ContainerFormat; 3] =
    [ContainerFormat::Webm, ContainerFormat::Ogg, ContainerFormat::Mp4];

impl ContainerFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Webm => "webm",
            ContainerFormat::Ogg => "ogg",
            ContainerFormat::Mp4 => "mp4",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ContainerFormat::Webm => "video/webm",
            ContainerFormat::Ogg => "video/ogg",
            ContainerFormat::Mp4 => "video/mp4",
        }
    }

    /// Get the FFmpeg muxer name for this format
    pub fn muxer(&self) -> &'static str {
        match self {
            ContainerFormat::Webm => "webm",
            ContainerFormat::Ogg => "ogg",
            ContainerFormat::Mp4 => "mp4",
        }
    }

    /// Get the FFmpeg video codec for this format
    pub fn video_codec(&self) -> &'static str {
        match self {
            ContainerFormat::Webm => "libvpx-vp9",
            ContainerFormat::Ogg => "libtheora",
            ContainerFormat::Mp4 => "libx264",
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Pick the first candidate the engine supports
pub fn negotiate_format(
    candidates: &[ContainerFormat],
    engine: &dyn CaptureEngine,
) -> RecordingResult<ContainerFormat> {
    for candidate in candidates {
        if engine.is_format_supported(*candidate) {
            tracing::info!("Negotiated container format {} with {}", candidate, engine.name());
            return Ok(*candidate);
        }
        tracing::debug!("{} does not support {}", engine.name(), candidate);
    }

    Err(RecordingError::FormatNegotiation(
        candidates.iter().map(|c| c.extension()).collect::<Vec<_>>().join(", "),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::testing::ScriptedEngine;

    #[test]
    fn test_first_supported_wins() {
        let engine = ScriptedEngine::supporting(&[ContainerFormat::Ogg, ContainerFormat::Mp4]);
        let format = negotiate_format(&DEFAULT_CANDIDATES, &engine).unwrap();
        assert_eq!(format, ContainerFormat::Ogg);
    }

    #[test]
    fn test_candidate_order_is_respected() {
        let engine = ScriptedEngine::supporting(&[ContainerFormat::Webm, ContainerFormat::Mp4]);
        let format =
            negotiate_format(&[ContainerFormat::Mp4, ContainerFormat::Webm], &engine).unwrap();
        assert_eq!(format, ContainerFormat::Mp4);
    }

    #[test]
    fn test_nothing_supported() {
        let engine = ScriptedEngine::supporting(&[]);
        let err = negotiate_format(&DEFAULT_CANDIDATES, &engine).unwrap_err();
        assert!(matches!(
            err,
            RecordingError::FormatNegotiation(ref list) if list == "webm, ogg, mp4"
        ));
    }

    #[test]
    fn test_empty_candidate_list() {
        let engine = ScriptedEngine::supporting(&DEFAULT_CANDIDATES);
        assert!(matches!(
            negotiate_format(&[], &engine),
            Err(RecordingError::FormatNegotiation(_))
        ));
    }

    #[test]
    fn test_mime_and_extension() {
        assert_eq!(ContainerFormat::Webm.mime_type(), "video/webm");
        assert_eq!(ContainerFormat::Ogg.extension(), "ogg");
        let parsed: ContainerFormat = serde_json::from_str("\"mp4\"").unwrap();
        assert_eq!(parsed, ContainerFormat::Mp4);
    }
}
