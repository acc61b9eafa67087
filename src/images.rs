// Data-URL handling, thumbnail downscale and aspect-ratio reformatting.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::EngineError;
use crate::models::schema::ImageRef;

/// Longest edge of generated thumbnails stored in node values.
pub const THUMBNAIL_MAX_DIM: u32 = 256;

/// Split a `data:<mime>;base64,<payload>` URL into mime type and raw bytes.
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>), EngineError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| EngineError::Parse("Expected a data URL".into()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| EngineError::Parse("Expected a base64 data URL".into()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| EngineError::Parse(format!("Invalid base64 image data: {}", e)))?;
    Ok((mime.to_string(), bytes))
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Build an inline image reference from a full data URL.
pub fn image_ref_from_data_url(url: &str) -> Result<ImageRef, EngineError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| EngineError::Parse("Expected a data URL".into()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| EngineError::Parse("Expected a base64 data URL".into()))?;
    Ok(ImageRef {
        base64_image_data: payload.to_string(),
        mime_type: mime.to_string(),
    })
}

pub fn data_url_from_image_ref(image: &ImageRef) -> String {
    format!(
        "data:{};base64,{}",
        image.mime_type, image.base64_image_data
    )
}

fn decode(url: &str) -> Result<DynamicImage, EngineError> {
    let (_, bytes) = parse_data_url(url)?;
    image::load_from_memory(&bytes)
        .map_err(|e| EngineError::Parse(format!("Failed to decode image: {}", e)))
}

fn encode_png(img: &DynamicImage) -> Result<String, EngineError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| EngineError::Parse(format!("Failed to encode image: {}", e)))?;
    Ok(to_data_url("image/png", &buf))
}

/// Downscale a full-resolution data URL into a thumbnail data URL. Images
/// already within bounds are re-encoded unchanged in size.
pub fn make_thumbnail(full_url: &str, max_dim: u32) -> Result<String, EngineError> {
    let img = decode(full_url)?;
    if img.width() <= max_dim && img.height() <= max_dim {
        return encode_png(&img);
    }
    encode_png(&img.thumbnail(max_dim, max_dim))
}

/// Parse `"16:9"`-style aspect ratio strings.
pub fn parse_aspect_ratio(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once(':')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some((w, h))
}

/// Pad an image onto a canvas of the target aspect ratio, centered, without
/// scaling the source pixels. Used before outpainting so the service fills
/// the new background.
pub fn reformat_to_aspect(url: &str, aspect_ratio: &str) -> Result<String, EngineError> {
    let (ar_w, ar_h) = parse_aspect_ratio(aspect_ratio).ok_or_else(|| {
        EngineError::Validation(format!("Invalid aspect ratio '{}'", aspect_ratio))
    })?;

    let img = decode(url)?;
    let (w, h) = (img.width(), img.height());

    // Cross-multiply in u64: user-supplied ratios can be large enough to
    // overflow u32.
    let (w64, h64) = (u64::from(w), u64::from(h));
    let (ar_w64, ar_h64) = (u64::from(ar_w), u64::from(ar_h));
    let grown = |num: u64, den: u64| {
        u32::try_from(num.div_ceil(den)).map_err(|_| {
            EngineError::Validation(format!(
                "Aspect ratio '{}' is too extreme for a {}x{} image",
                aspect_ratio, w, h
            ))
        })
    };
    // Canvas keeps the source fully visible: grow one dimension to match.
    let (canvas_w, canvas_h) = if w64 * ar_h64 >= h64 * ar_w64 {
        (w, grown(w64 * ar_h64, ar_w64)?)
    } else {
        (grown(h64 * ar_w64, ar_h64)?, h)
    };

    if canvas_w == w && canvas_h == h {
        return encode_png(&img);
    }

    let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, Rgba([0, 0, 0, 255]));
    let x = (canvas_w - w) / 2;
    let y = (canvas_h - h) / 2;
    imageops::overlay(&mut canvas, &img.to_rgba8(), i64::from(x), i64::from(y));
    encode_png(&DynamicImage::ImageRgba8(canvas))
}
