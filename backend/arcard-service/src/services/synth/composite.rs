//! Prints the code image onto the photo.
//!
//! The code is copied opaquely into the bottom-left corner, `CODE_MARGIN`
//! pixels from both edges. Output is PNG so the code stays lossless.

use super::SynthError;
use image::{DynamicImage, GenericImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use tracing::debug;

pub const CODE_MARGIN: u32 = 10;

#[derive(Debug)]
pub struct CompositeResult {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Top-left position of the code inside a `photo_height` tall photo, or
/// `None` when the code plus its bottom margin does not fit
fn code_anchor(photo_height: u32, code_height: u32) -> Option<(u32, u32)> {
    photo_height
        .checked_sub(code_height)
        .and_then(|y| y.checked_sub(CODE_MARGIN))
        .map(|y| (CODE_MARGIN, y))
}

/// Compose synchronously; callers on the async runtime go through
/// `spawn_blocking`.
pub fn compose(photo_bytes: &[u8], code_bytes: &[u8]) -> Result<CompositeResult, SynthError> {
    let photo = image::load_from_memory(photo_bytes)
        .map_err(|e| SynthError::Image(format!("failed to decode photo: {e}")))?;
    let code = image::load_from_memory(code_bytes)
        .map_err(|e| SynthError::Image(format!("failed to decode code image: {e}")))?;

    let (width, height) = photo.dimensions();
    let (code_w, code_h) = code.dimensions();
    let min_w = CODE_MARGIN + code_w;
    let min_h = CODE_MARGIN + code_h;
    let (x, y) = match code_anchor(height, code_h) {
        Some(anchor) if width >= min_w => anchor,
        _ => {
            return Err(SynthError::PhotoTooSmall {
                width,
                height,
                min_width: min_w,
                min_height: min_h,
            })
        }
    };

    let keep_alpha = photo.color().has_alpha();
    let mut canvas = photo.to_rgba8();
    canvas
        .copy_from(&code.to_rgba8(), x, y)
        .map_err(|e| SynthError::Image(format!("failed to place code image: {e}")))?;

    let out = if keep_alpha {
        DynamicImage::ImageRgba8(canvas)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    };

    let mut png = Vec::new();
    out.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| SynthError::Image(format!("failed to encode composite: {e}")))?;

    debug!(width, height, x, y, size = png.len(), "composite rendered");

    Ok(CompositeResult { png, width, height })
}
