//! PNG snapshots of composited frames

use super::types::{ExportError, ExportResult};
use crate::compositor::CompositeFrame;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Encode a composite frame as an 8-bit RGBA PNG
pub fn encode_png<W: Write>(frame: &CompositeFrame, out: W) -> ExportResult<()> {
    let expected = frame.resolution().rgba_len();
    if expected != Some(frame.pixels.len()) {
        return Err(ExportError::Encoding(format!(
            "frame {} is {}x{} but has {} bytes",
            frame.sequence,
            frame.width,
            frame.height,
            frame.pixels.len()
        )));
    }

    let mut encoder = png::Encoder::new(out, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| ExportError::Encoding(e.to_string()))?;
    writer
        .write_image_data(&frame.pixels)
        .map_err(|e| ExportError::Encoding(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| ExportError::Encoding(e.to_string()))?;

    Ok(())
}

/// Write a composite frame to `path` as PNG
pub fn write_png(frame: &CompositeFrame, path: &Path) -> ExportResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_png(frame, &mut writer)?;
    writer.flush()?;

    tracing::debug!("Wrote snapshot of frame {} to {:?}", frame.sequence, path);
    Ok(())
}
