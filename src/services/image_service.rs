use crate::error::AppError;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Largest upload accepted (20MB)
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const THUMBNAIL_SIZE: u32 = 320;
const THUMBNAIL_QUALITY: u8 = 80;

/// Decodes an uploaded JPEG or PNG.
pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    if bytes.is_empty() {
        return Err(AppError::InvalidImage("Image data is empty".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::InvalidImage(format!(
            "Image data is too large: {} bytes (max: {} bytes)",
            bytes.len(),
            MAX_UPLOAD_BYTES
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|_| AppError::InvalidImage("Unsupported image format".to_string()))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(AppError::InvalidImage(format!(
            "Unsupported image format {:?}, expected JPEG or PNG",
            format
        )));
    }

    Ok(image::load_from_memory_with_format(bytes, format)?)
}

/// Accepts bare base64 or a `data:<mime>;base64,` URI.
pub fn decode_base64_payload(data: &str) -> Result<Vec<u8>, AppError> {
    let payload = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::InvalidImage(format!("Invalid base64 encoding: {}", e)))
}

/// Small JPEG preview as a data URI.
pub fn thumbnail_data_uri(img: &DynamicImage) -> Result<String, AppError> {
    let thumb = if img.width() > THUMBNAIL_SIZE || img.height() > THUMBNAIL_SIZE {
        img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle)
    } else {
        img.clone()
    };
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(thumb.to_rgb8());

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, THUMBNAIL_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| AppError::InvalidImage(format!("Failed to encode thumbnail: {}", e)))?;

    Ok(data_uri("image/jpeg", &buffer.into_inner()))
}

/// Lossless PNG data URI; keeps transparency.
pub fn png_data_uri(img: &DynamicImage) -> Result<String, AppError> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_with_encoder(PngEncoder::new(&mut buffer))
        .map_err(|e| AppError::InvalidImage(format!("Failed to encode PNG: {}", e)))?;
    Ok(data_uri("image/png", &buffer.into_inner()))
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, b64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_png_upload() {
        let bytes = png_bytes(&DynamicImage::new_rgb8(7, 5));
        let img = decode_upload(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (7, 5));
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert!(matches!(decode_upload(&[]), Err(AppError::InvalidImage(_))));
        assert!(matches!(
            decode_upload(b"definitely not an image"),
            Err(AppError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_rejects_other_formats() {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(4, 4)
            .write_to(&mut buffer, ImageFormat::Bmp)
            .unwrap();
        assert!(decode_upload(buffer.get_ref()).is_err());
    }

    #[test]
    fn test_base64_payload_with_data_uri_prefix() {
        let bytes = png_bytes(&DynamicImage::new_rgb8(3, 3));
        let uri = data_uri("image/png", &bytes);
        assert_eq!(decode_base64_payload(&uri).unwrap(), bytes);
        assert!(decode_base64_payload("%%%").is_err());
    }

    #[test]
    fn test_thumbnail_is_jpeg_even_with_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(600, 400, Rgba([1, 2, 3, 0])));
        let uri = thumbnail_data_uri(&img).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));

        let decoded = decode_base64_payload(&uri).unwrap();
        let thumb = image::load_from_memory(&decoded).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (320, 213));
    }

    #[test]
    fn test_png_keeps_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 0])));
        let decoded = decode_base64_payload(&png_data_uri(&img).unwrap()).unwrap();
        let back = image::load_from_memory(&decoded).unwrap().to_rgba8();
        assert_eq!(back.get_pixel(0, 0).0[3], 0);
    }
}
