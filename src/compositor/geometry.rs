//! Compositing geometry
//!
//! Pure functions mapping a surface size and layout to destination rectangles
//! and clip shapes. Nothing here depends on frame content, so the same input
//! always yields the same geometry.

use super::layout::ContainerShape;
use serde::{Deserialize, Serialize};

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Canonical output resolution
    pub const FULL_HD: Resolution = Resolution::new(1920, 1080);

    /// Number of bytes in an RGBA8 buffer of this size, if it fits in memory
    pub fn rgba_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Clip applied while drawing a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipShape {
    None,
    Circle {
        center_x: f64,
        center_y: f64,
        radius: u32,
    },
}

impl ClipShape {
    /// Check if the pixel at (x, y) is kept by this clip
    ///
    /// Pixels are sampled at their centres.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        match *self {
            ClipShape::None => true,
            ClipShape::Circle {
                center_x,
                center_y,
                radius,
            } => {
                let dx = x as f64 + 0.5 - center_x;
                let dy = y as f64 + 0.5 - center_y;
                let r = radius as f64;
                dx * dx + dy * dy <= r * r
            }
        }
    }
}

/// Where and how a secondary source is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayGeometry {
    pub dest: Rect,
    pub clip: ClipShape,
}

impl OverlayGeometry {
    pub fn radius(&self) -> Option<u32> {
        match self.clip {
            ClipShape::Circle { radius, .. } => Some(radius),
            ClipShape::None => None,
        }
    }
}

/// The primary source covers the whole surface
pub fn primary_rect(surface: Resolution) -> Rect {
    Rect {
        x: 0,
        y: 0,
        width: surface.width,
        height: surface.height,
    }
}

/// Secondary sources are scaled to half the surface's linear dimensions and
/// centred on it.
pub fn overlay_geometry(surface: Resolution, container: ContainerShape) -> OverlayGeometry {
    let width = surface.width / 2;
    let height = surface.height / 2;
    let dest = Rect {
        x: (surface.width - width) / 2,
        y: (surface.height - height) / 2,
        width,
        height,
    };

    let clip = if container.is_round() {
        let (center_x, center_y) = dest.center();
        ClipShape::Circle {
            center_x,
            center_y,
            radius: clip_radius(width, height),
        }
    } else {
        ClipShape::None
    };

    OverlayGeometry { dest, clip }
}

/// round(min(w, h) / 2), rounding halves up
pub fn clip_radius(width: u32, height: u32) -> u32 {
    (width.min(height) as f64 / 2.0).round() as u32
}
