//! Composite output stream
//!
//! Single producer (the tick loop), any number of read-only consumers. Each
//! published frame is a copy of the surface, so consumers never observe the
//! surface while it is being drawn.

use super::geometry::Resolution;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// One published composite frame
#[derive(Debug, Clone)]
pub struct CompositeFrame {
    /// Tick sequence number, starting at 0
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixels, row-major
    pub pixels: Arc<[u8]>,
}

impl CompositeFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

type Slot = Option<Arc<CompositeFrame>>;

/// Producer half, owned by the tick loop
pub(crate) struct StreamPublisher {
    tx: watch::Sender<Slot>,
}

impl StreamPublisher {
    pub(crate) fn publish(&self, frame: CompositeFrame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }
}

/// Read-only handle over the composited stream
#[derive(Debug, Clone)]
pub struct OutputStreamHandle {
    rx: watch::Receiver<Slot>,
    resolution: Resolution,
    frame_rate: u32,
}

impl OutputStreamHandle {
    /// Create a connected producer/consumer pair
    pub(crate) fn channel(resolution: Resolution, frame_rate: u32) -> (StreamPublisher, Self) {
        let (tx, rx) = watch::channel(None);
        (
            StreamPublisher { tx },
            Self {
                rx,
                resolution,
                frame_rate,
            },
        )
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Nominal frames per second of the producer
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Most recently published frame
    pub fn latest(&self) -> Option<Arc<CompositeFrame>> {
        self.rx.borrow().clone()
    }

    /// Wait for a frame newer than the last one seen through this handle
    ///
    /// Returns `None` once the producer is gone.
    pub async fn next_frame(&mut self) -> Option<Arc<CompositeFrame>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }

    /// Whether the producer still exists
    pub fn is_live(&self) -> bool {
        self.rx.has_changed().is_ok()
    }
}
