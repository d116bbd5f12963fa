//! Rendering surface
//!
//! [`FrameSurface`] is the drawing target the compositor paints into.
//! [`CpuSurface`] is an RGBA8 software implementation with nearest-neighbour
//! scaling and per-pixel clipping.

use super::geometry::{ClipShape, Rect, Resolution};
use super::source::VideoFrame;
use super::types::{CompositorError, SurfaceError};

/// Drawing target with a fixed pixel size
pub trait FrameSurface: Send {
    fn size(&self) -> Resolution;

    /// Scale `frame` into `dest`, keeping only pixels inside `clip`
    fn draw(&mut self, frame: &VideoFrame, dest: Rect, clip: ClipShape) -> Result<(), SurfaceError>;

    /// Current RGBA8 contents, row-major
    fn pixels(&self) -> &[u8];
}

/// Software RGBA8 surface
pub struct CpuSurface {
    size: Resolution,
    pixels: Vec<u8>,
}

impl CpuSurface {
    /// Allocate a surface, failing if the buffer cannot be reserved
    pub fn new(size: Resolution) -> Result<Self, CompositorError> {
        if size.is_empty() {
            return Err(CompositorError::SurfaceAllocation(format!(
                "invalid surface size {}x{}",
                size.width, size.height
            )));
        }

        let len = size.rgba_len().ok_or_else(|| {
            CompositorError::SurfaceAllocation(format!(
                "surface {}x{} overflows address space",
                size.width, size.height
            ))
        })?;

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|e| {
            CompositorError::SurfaceAllocation(format!(
                "cannot reserve {} bytes for {}x{} surface: {}",
                len, size.width, size.height, e
            ))
        })?;
        pixels.resize(len, 0);

        tracing::debug!("Allocated {}x{} surface ({} bytes)", size.width, size.height, len);

        Ok(Self { size, pixels })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let idx = (y as usize * self.size.width as usize + x as usize) * 4;
        let px = &self.pixels[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl FrameSurface for CpuSurface {
    fn size(&self) -> Resolution {
        self.size
    }

    fn draw(
        &mut self,
        frame: &VideoFrame,
        dest: Rect,
        clip: ClipShape,
    ) -> Result<(), SurfaceError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(SurfaceError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }

        let expected = frame.expected_len().unwrap_or(usize::MAX);
        if frame.data.len() != expected {
            return Err(SurfaceError::FrameSizeMismatch {
                width: frame.width,
                height: frame.height,
                expected,
                actual: frame.data.len(),
            });
        }

        let right = dest.x as u64 + dest.width as u64;
        let bottom = dest.y as u64 + dest.height as u64;
        if right > self.size.width as u64 || bottom > self.size.height as u64 {
            return Err(SurfaceError::OutOfBounds {
                x: dest.x,
                y: dest.y,
                width: dest.width,
                height: dest.height,
            });
        }

        if dest.width == 0 || dest.height == 0 {
            return Ok(());
        }

        // Source column for every destination column
        let src_columns: Vec<usize> = (0..dest.width)
            .map(|dx| {
                let sx = dx as u64 * frame.width as u64 / dest.width as u64;
                (sx as u32).min(frame.width - 1) as usize
            })
            .collect();

        let surface_width = self.size.width as usize;
        let frame_width = frame.width as usize;

        for dy in 0..dest.height {
            let sy = (dy as u64 * frame.height as u64 / dest.height as u64) as u32;
            let sy = sy.min(frame.height - 1) as usize;
            let py = dest.y + dy;

            for (dx, &sx) in src_columns.iter().enumerate() {
                let px = dest.x + dx as u32;
                if !clip.contains(px, py) {
                    continue;
                }

                let src_idx = (sy * frame_width + sx) * 4;
                let dest_idx = (py as usize * surface_width + px as usize) * 4;

                self.pixels[dest_idx..dest_idx + 3]
                    .copy_from_slice(&frame.data[src_idx..src_idx + 3]);
                self.pixels[dest_idx + 3] = 255;
            }
        }

        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
