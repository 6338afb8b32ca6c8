use super::*;

#[test]
fn over_src_alpha_0_is_noop() {
    let dst = [10, 20, 30, 255];
    assert_eq!(over(dst, [0, 0, 0, 0]), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src), src);
}

#[test]
fn over_half_alpha_mixes_and_stays_opaque() {
    let dst = [200, 200, 200, 255];
    let src = premultiply([0, 0, 0, 128]);
    let out = over(dst, src);
    assert_eq!(out[3], 255);
    assert_eq!(out[0], 100);
}

#[test]
fn premultiply_scales_by_alpha() {
    assert_eq!(premultiply([100, 50, 200, 128]), [50, 25, 100, 128]);
    assert_eq!(premultiply([100, 50, 200, 0]), [0, 0, 0, 0]);
    assert_eq!(premultiply([100, 50, 200, 255]), [100, 50, 200, 255]);
}

#[test]
fn over_opaque_in_place_keeps_base_where_overlay_is_clear() {
    let mut base = Raster::new(2, 1, PixelFormat::Rgba8, vec![40, 40, 40, 255, 90, 90, 90, 255])
        .unwrap();
    let overlay =
        Raster::new(2, 1, PixelFormat::Rgba8, vec![0, 0, 0, 0, 0, 0, 0, 255]).unwrap();
    over_opaque_in_place(&mut base, &overlay).unwrap();
    assert_eq!(base.data(), &[40, 40, 40, 255, 0, 0, 0, 255]);
}

#[test]
fn over_opaque_in_place_rejects_size_mismatch() {
    let mut base = Raster::filled(2, 2, PixelFormat::Rgba8, &[0, 0, 0, 255]).unwrap();
    let overlay = Raster::filled(1, 2, PixelFormat::Rgba8, &[0, 0, 0, 0]).unwrap();
    assert!(over_opaque_in_place(&mut base, &overlay).is_err());
}

#[test]
fn scale_rgb_by_applies_factor_per_pixel() {
    let base = Raster::new(2, 1, PixelFormat::Rgb8, vec![200, 100, 50, 200, 100, 50]).unwrap();
    let out = scale_rgb_by(&base, &[255, 0], |c, w| f32::from(c) * f32::from(w) / 255.0).unwrap();
    assert_eq!(out.data(), &[200, 100, 50, 0, 0, 0]);
    assert!(scale_rgb_by(&base, &[1], |c, _| f32::from(c)).is_err());
}
