use image::{imageops::FilterType, DynamicImage, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// Longest side, in pixels, kept before downscaling.
const MAX_SIDE: u32 = 2800;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
    #[error("Image is empty")]
    Empty,
}

/// Decode uploaded bytes (JPEG / PNG / WEBP / …) into an RGB pixel grid.
pub fn decode_rgb(data: &[u8]) -> Result<RgbImage, PreprocessError> {
    if data.is_empty() {
        return Err(PreprocessError::Empty);
    }
    let img = image::load_from_memory(data)?;
    Ok(limit_size(img).to_rgb8())
}

/// Down-scale very large photos; OCR gains nothing beyond ~300 DPI.
fn limit_size(img: DynamicImage) -> DynamicImage {
    if img.width() > MAX_SIDE || img.height() > MAX_SIDE {
        img.resize(MAX_SIDE, MAX_SIDE, FilterType::Lanczos3)
    } else {
        img
    }
}

/// Re-encode as PNG for engines that take encoded bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Channel-first `[3, size, size]` pixel values, rescaled to 0–1 and
/// normalized with mean 0.5 / std 0.5 (the LayoutLMv3 image processor).
pub fn pixel_values(img: &RgbImage, size: u32) -> Vec<f32> {
    let resized = image::imageops::resize(img, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut out = vec![0.0f32; 3 * plane];
    for (i, px) in resized.pixels().enumerate() {
        for c in 0..3 {
            out[c * plane + i] = (f32::from(px[c]) / 255.0 - 0.5) / 0.5;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        ImageBuffer::from_fn(width, height, |_, _| Rgb([value, value, value]))
    }

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        encode_png(img).unwrap()
    }

    #[test]
    fn decode_round_trips_png() {
        let img = solid(4, 3, 100);
        let decoded = decode_rgb(&png_bytes(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([100, 100, 100]));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_rgb(b"not an image"), Err(PreprocessError::Decode(_))));
        assert!(matches!(decode_rgb(b""), Err(PreprocessError::Empty)));
    }

    #[test]
    fn encode_png_has_magic_header() {
        assert_eq!(&png_bytes(&solid(2, 2, 0))[..4], b"\x89PNG");
    }

    #[test]
    fn large_image_is_resized() {
        let img = limit_size(DynamicImage::ImageRgb8(solid(3000, 1000, 200)));
        assert!(img.width() <= MAX_SIDE && img.height() <= MAX_SIDE);
    }

    #[test]
    fn pixel_values_are_normalized_channel_first() {
        let white = pixel_values(&solid(4, 4, 255), 2);
        assert_eq!(white.len(), 12);
        assert!(white.iter().all(|v| (v - 1.0).abs() < 1e-2));

        let black = pixel_values(&solid(4, 4, 0), 2);
        assert!(black.iter().all(|v| (v + 1.0).abs() < 1e-2));
    }
}
