use std::io::Cursor;

use super::*;

fn png_bytes(img: image::DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_png_into_requested_format() {
    let src = image::RgbaImage::from_raw(1, 1, vec![100, 50, 200, 128]).unwrap();
    let bytes = png_bytes(image::DynamicImage::ImageRgba8(src));

    let rgba = decode_raster(&bytes, PixelFormat::Rgba8).unwrap();
    assert_eq!(rgba.data(), &[100, 50, 200, 128]);

    let rgb = decode_raster(&bytes, PixelFormat::Rgb8).unwrap();
    assert_eq!(rgb.data(), &[100, 50, 200]);
}

#[test]
fn decode_rejects_empty_and_truncated_buffers() {
    assert!(matches!(
        decode_raster(&[], PixelFormat::Rgb8),
        Err(CloudError::Acquisition(_))
    ));

    let src = image::RgbImage::from_raw(4, 4, vec![7; 48]).unwrap();
    let bytes = png_bytes(image::DynamicImage::ImageRgb8(src));
    let truncated = &bytes[..bytes.len() / 2];
    assert!(matches!(
        decode_raster(truncated, PixelFormat::Rgb8),
        Err(CloudError::Acquisition(_))
    ));
}

#[test]
fn decode_sized_checks_dimensions() {
    let src = image::RgbImage::from_raw(4, 2, vec![7; 24]).unwrap();
    let bytes = png_bytes(image::DynamicImage::ImageRgb8(src));
    decode_sized(&bytes, PixelFormat::Rgb8, 4, 2).unwrap();
    let err = decode_sized(&bytes, PixelFormat::Rgb8, 4, 4).unwrap_err();
    assert!(err.to_string().contains("expected 4x4"));
}
