//! Frame sources
//!
//! A [`FrameSource`] wraps one live video producer owned by the acquisition
//! layer. The compositor only holds a shared reference for the lifetime of a
//! session and pulls the latest decoded frame on each tick.

use super::geometry::Resolution;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One decoded RGBA8 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA pixel data
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Frame filled with a single colour
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self::new(width, height, data)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Byte length the pixel buffer should have for the declared dimensions
    pub fn expected_len(&self) -> Option<usize> {
        self.resolution().rgba_len()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// A live producer of video frames
pub trait FrameSource: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Whether a current frame is available to draw
    fn is_ready(&self) -> bool;

    /// Resolution the producer delivers frames at
    fn native_size(&self) -> Resolution;

    /// Most recent decoded frame, if any
    fn latest_frame(&self) -> Option<Arc<VideoFrame>>;
}

/// Source fed by an external producer
///
/// The acquisition layer pushes decoded frames with [`SharedFrameSource::push_frame`];
/// the source reports ready once the first frame has arrived.
pub struct SharedFrameSource {
    id: String,
    native_size: Resolution,
    frame: RwLock<Option<Arc<VideoFrame>>>,
    frames_received: AtomicU64,
}

impl SharedFrameSource {
    pub fn new(id: impl Into<String>, native_size: Resolution) -> Self {
        Self {
            id: id.into(),
            native_size,
            frame: RwLock::new(None),
            frames_received: AtomicU64::new(0),
        }
    }

    /// Replace the current frame
    pub fn push_frame(&self, frame: VideoFrame) {
        *self.frame.write() = Some(Arc::new(frame));
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop the current frame, making the source unready until the next push
    pub fn clear(&self) {
        *self.frame.write() = None;
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }
}

impl FrameSource for SharedFrameSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_ready(&self) -> bool {
        self.frame.read().is_some()
    }

    fn native_size(&self) -> Resolution {
        self.native_size
    }

    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.frame.read().clone()
    }
}

/// Synthetic test pattern
///
/// Always ready. Used by the demo binary and by hosts without a camera.
pub struct PatternSource {
    id: String,
    frame: Arc<VideoFrame>,
}

impl PatternSource {
    /// Single colour pattern
    pub fn solid(id: impl Into<String>, size: Resolution, rgba: [u8; 4]) -> Self {
        Self {
            id: id.into(),
            frame: Arc::new(VideoFrame::solid(size.width, size.height, rgba)),
        }
    }

    /// Horizontal gradient from `from` to `to`
    pub fn gradient(id: impl Into<String>, size: Resolution, from: [u8; 3], to: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(size.rgba_len().unwrap_or(0));
        let span = size.width.saturating_sub(1).max(1) as f32;
        for _ in 0..size.height {
            for x in 0..size.width {
                let t = x as f32 / span;
                for c in 0..3 {
                    let value = from[c] as f32 + (to[c] as f32 - from[c] as f32) * t;
                    data.push(value.round().clamp(0.0, 255.0) as u8);
                }
                data.push(255);
            }
        }
        Self {
            id: id.into(),
            frame: Arc::new(VideoFrame::new(size.width, size.height, data)),
        }
    }
}

impl FrameSource for PatternSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn native_size(&self) -> Resolution {
        self.frame.resolution()
    }

    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        Some(self.frame.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_source_ready_after_first_push() {
        let source = SharedFrameSource::new("camera", Resolution::new(4, 4));
        assert!(!source.is_ready());
        assert!(source.latest_frame().is_none());

        source.push_frame(VideoFrame::solid(4, 4, [1, 2, 3, 255]));
        assert!(source.is_ready());
        assert_eq!(source.frames_received(), 1);
        assert_eq!(source.latest_frame().unwrap().pixel(3, 3), Some([1, 2, 3, 255]));

        source.clear();
        assert!(!source.is_ready());
    }

    #[test]
    fn test_gradient_endpoints() {
        let source =
            PatternSource::gradient("bars", Resolution::new(3, 1), [0, 0, 0], [255, 100, 0]);
        let frame = source.latest_frame().unwrap();
        assert_eq!(frame.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(frame.pixel(2, 0), Some([255, 100, 0, 255]));
        assert_eq!(frame.data.len(), frame.expected_len().unwrap());
    }

    #[test]
    fn test_pixel_out_of_bounds() {
        let frame = VideoFrame::solid(2, 2, [0; 4]);
        assert!(frame.pixel(2, 0).is_none());
    }
}
