use super::SynthError;
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;

/// Edge length of the generated code image in pixels
pub const CODE_IMAGE_SIZE: u32 = 200;

/// Light border around the symbol, in modules
const QUIET_ZONE_MODULES: u32 = 4;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Render `data` as a QR symbol (level M) centred on a white 200×200 canvas.
///
/// Modules are drawn at the largest integer scale that fits, quiet zone
/// included.
pub fn render_code(data: &str) -> Result<GrayImage, SynthError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
        .map_err(|e| SynthError::CodeEncoding(e.to_string()))?;

    let modules = code.width() as u32;
    let total = modules + 2 * QUIET_ZONE_MODULES;
    let scale = CODE_IMAGE_SIZE / total;
    if scale == 0 {
        return Err(SynthError::CodeEncoding(format!(
            "{modules} modules do not fit in {CODE_IMAGE_SIZE}px"
        )));
    }
    let offset = (CODE_IMAGE_SIZE - total * scale) / 2 + QUIET_ZONE_MODULES * scale;

    let mut img = GrayImage::from_pixel(CODE_IMAGE_SIZE, CODE_IMAGE_SIZE, LIGHT);
    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let mx = i as u32 % modules;
        let my = i as u32 / modules;
        let x0 = offset + mx * scale;
        let y0 = offset + my * scale;
        for y in y0..y0 + scale {
            for x in x0..x0 + scale {
                img.put_pixel(x, y, DARK);
            }
        }
    }

    Ok(img)
}

pub fn encode_png(img: GrayImage) -> Result<Vec<u8>, SynthError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .map_err(|e| SynthError::Image(format!("failed to encode code image: {e}")))?;
    Ok(buf)
}
