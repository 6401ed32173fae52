use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;

/// Vendor quality floor: face/garment restoration degrades below this.
pub const MIN_SIDE: u32 = 150;

/// Vendor resolution ceiling for either dimension.
pub const MAX_SIDE: u32 = 4000;

/// Vendor hard cap on upload size.
pub const MAX_BYTES: usize = 5 * 1024 * 1024;

const START_QUALITY: u8 = 92;
const QUALITY_STEP: u8 = 5;
const QUALITY_FLOOR: u8 = 70;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("image is {width}x{height}, both sides must be at least {MIN_SIDE}px")]
    TooSmall { width: u32, height: u32 },

    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// Normalize an uploaded image for the try-on vendor.
///
/// Decodes to RGB, rejects images whose shorter side is under [`MIN_SIDE`],
/// downscales so the longer side is at most [`MAX_SIDE`] (aspect preserved),
/// and re-encodes as JPEG, stepping quality down until the output fits under
/// [`MAX_BYTES`] or the quality floor is reached. At the floor the
/// best-effort output is returned and the vendor surfaces any size error.
///
/// Pure with respect to its input; safe to call concurrently.
pub fn prepare(data: &[u8]) -> Result<(Vec<u8>, &'static str), ImageError> {
    let decoded = image::load_from_memory(data).map_err(|e| ImageError::Decode(e.to_string()))?;
    let mut rgb = decoded.to_rgb8();

    let (width, height) = rgb.dimensions();
    if width.min(height) < MIN_SIDE {
        return Err(ImageError::TooSmall { width, height });
    }

    if width.max(height) > MAX_SIDE {
        let (new_w, new_h) = scaled_dimensions(width, height);
        rgb = image::imageops::resize(&rgb, new_w, new_h, FilterType::Lanczos3);
    }

    let mut quality = START_QUALITY;
    let mut encoded = encode_jpeg(&rgb, quality)?;
    while encoded.len() > MAX_BYTES && quality > QUALITY_FLOOR {
        quality -= QUALITY_STEP;
        encoded = encode_jpeg(&rgb, quality)?;
    }

    Ok((encoded, "image/jpeg"))
}

/// Proportional downscale so the longer side equals [`MAX_SIDE`] exactly.
fn scaled_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width >= height {
        let h = ((height as f64) * (MAX_SIDE as f64) / (width as f64)).round() as u32;
        (MAX_SIDE, h.max(1))
    } else {
        let w = ((width as f64) * (MAX_SIDE as f64) / (height as f64)).round() as u32;
        (w.max(1), MAX_SIDE)
    }
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(img)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder, Rgb};

    fn solid_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([40, 40, 40]));
        encode_jpeg(&img, 92).unwrap()
    }

    fn noise_png(width: u32, height: u32) -> Vec<u8> {
        // Deterministic LCG noise so the PNG barely compresses.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let b = (state >> 33) as u32;
            Rgb([(b & 0xff) as u8, ((b >> 8) & 0xff) as u8, ((b >> 16) & 0xff) as u8])
        });
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    #[test]
    fn test_undecodable_input_rejected() {
        let err = prepare(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[test]
    fn test_below_minimum_side_rejected() {
        let err = prepare(&solid_jpeg(2, 2)).unwrap_err();
        assert!(matches!(err, ImageError::TooSmall { width: 2, height: 2 }));
    }

    #[test]
    fn test_short_side_just_under_minimum_rejected() {
        let err = prepare(&solid_jpeg(1000, 149)).unwrap_err();
        assert!(matches!(err, ImageError::TooSmall { .. }));
    }

    #[test]
    fn test_normal_image_passes_through_as_jpeg() {
        let (bytes, mime) = prepare(&solid_jpeg(800, 600)).unwrap();
        assert_eq!(mime, "image/jpeg");
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!((out.width(), out.height()), (800, 600));
    }

    #[test]
    fn test_oversized_image_downscaled_preserving_aspect() {
        let (bytes, _) = prepare(&solid_jpeg(8000, 2000)).unwrap();
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!(out.width(), MAX_SIDE);
        assert_eq!(out.height(), 1000);
    }

    #[test]
    fn test_portrait_downscale_long_side_exact() {
        let (bytes, _) = prepare(&solid_jpeg(2001, 6000)).unwrap();
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!(out.height(), MAX_SIDE);
        // 2001 * 4000/6000 = 1334, aspect preserved within a pixel
        assert_eq!(out.width(), 1334);
    }

    #[test]
    fn test_large_synthetic_image_fits_under_cap() {
        // Incompressible noise: ~13.5MB of raw pixel data.
        let input = noise_png(10000, 450);
        assert!(input.len() > 10 * 1024 * 1024, "fixture should be >10MB, got {}", input.len());
        let (bytes, _) = prepare(&input).unwrap();
        assert!(bytes.len() <= MAX_BYTES, "output {} exceeds cap", bytes.len());
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!(out.width(), MAX_SIDE);
        assert_eq!(out.height(), 180);
    }

    #[test]
    fn test_scaled_dimensions_rounding() {
        assert_eq!(scaled_dimensions(8000, 2000), (4000, 1000));
        assert_eq!(scaled_dimensions(4001, 4001), (4000, 4000));
        assert_eq!(scaled_dimensions(5000, 4500), (4000, 3600));
    }
}
