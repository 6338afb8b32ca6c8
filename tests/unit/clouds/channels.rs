use super::*;
use crate::foundation::core::Geometry;

fn halves(side: u32, left: [u8; 3], right: [u8; 3]) -> (Raster, Raster) {
    (
        Raster::filled(side, side, PixelFormat::Rgb8, &left).unwrap(),
        Raster::filled(side, side, PixelFormat::Rgb8, &right).unwrap(),
    )
}

fn sources(side: u32, ir: [u8; 3], dust: [u8; 3], visible: [u8; 3]) -> ChannelSources {
    let (ir_left, ir_right) = halves(side, ir, ir);
    let (dust_left, dust_right) = halves(side, dust, dust);
    let (visible_left, visible_right) = halves(side, visible, visible);
    ChannelSources {
        ir_left,
        ir_right,
        dust_left,
        dust_right,
        visible_left,
        visible_right,
    }
}

#[test]
fn ir_remap_bounds_and_midpoint() {
    assert_eq!(ir_remap(0), 0.0);
    assert_eq!(ir_remap(72), 0.0);
    assert_eq!(ir_remap(178), 255.0);
    assert_eq!(ir_remap(250), 255.0);
    let mid = ir_remap(125);
    assert!((mid - 255.0 * 53.0 / 106.0).abs() < 1e-3, "{mid}");
    let corrected = ir_signal(125);
    let expected = 255.0 * (mid / 255.0).powf(1.0 / 1.46);
    assert!((corrected - expected).abs() < 1e-3);
    assert!((corrected - 158.6).abs() < 0.1, "{corrected}");
}

#[test]
fn dust_scenario_matches_closed_form() {
    let m = masked_red(200, 50);
    assert!((m - 200.0 * 205.0 / 255.0).abs() < 1e-3, "{m}");
    assert!((m - 160.78).abs() < 0.01);

    let d = dust_signal(200, 50);
    let expected = 255.0 * (1.0 - (1.0 - m / 255.0) * (1.0 - 102.5 / 255.0));
    assert!((d - expected).abs() < 1e-3, "{d} vs {expected}");
    assert!((d - 198.66).abs() < 0.05);
}

#[test]
fn visible_predicate() {
    assert!(visible_selected(200, 205, 210));
    assert!(!visible_selected(20, 80, 140));
    // green-dominant bright pixel with close blue passes through the second clause
    assert!(visible_selected(100, 180, 175));
    assert!(!visible_selected(100, 180, 160));
    assert!(!visible_selected(100, 140, 138));
}

#[test]
fn blend_pixel_prefers_brighter_visible_signal() {
    let dark_ir = [0, 0, 0];
    let neutral_dust = [0, 0, 255];
    assert_eq!(blend_pixel(&dark_ir, &neutral_dust, &[0, 0, 0]), 0);

    let grey = [128, 128, 128];
    let out = blend_pixel(&dark_ir, &neutral_dust, &grey);
    assert_eq!(out, to_u8(gamma(VISIBLE_GAMMA, 128.0)));

    let coloured = [10, 90, 200];
    assert_eq!(blend_pixel(&dark_ir, &neutral_dust, &coloured), 0);
}

#[test]
fn blend_pixel_matches_closed_form() {
    for v in (0..=255u8).step_by(17) {
        for w in (0..=255u8).step_by(51) {
            let (ir, dust, visible) = ([v, w, v], [w, v, v], [v, v, w]);
            let got = blend_pixel(&ir, &dust, &visible);
            let combined = combine(dust_signal(w, v), ir_signal(v));
            let expected = if visible_selected(v, v, w) {
                gamma(VISIBLE_GAMMA, f32::from(v.max(w))).max(combined)
            } else {
                combined
            };
            assert_eq!(got, to_u8(expected), "ir={ir:?} dust={dust:?} visible={visible:?}");
            assert!(got >= to_u8(combined));
        }
    }
    assert_eq!(blend_pixel(&[255; 3], &[255, 0, 0], &[255; 3]), 255);
}

#[test]
fn blend_pixel_never_darkens_as_ir_rises() {
    let dust = [120, 0, 90];
    let visible = [200, 20, 40];
    assert!(!visible_selected(200, 20, 40));
    let mut prev = 0;
    for raw in 0..=255u8 {
        let v = blend_pixel(&[raw, 0, 0], &dust, &visible);
        assert!(v >= prev, "ir {raw}: {v} < {prev}");
        prev = v;
    }
}

#[test]
fn merged_pair_reads_right_half_first() {
    let (left, right) = halves(8, [1, 1, 1], [2, 2, 2]);
    let g = Geometry::from_height(8).unwrap();
    let pair = MergedPair::new(&left, &right, g, "test").unwrap();
    let [first, second] = pair.row_halves(3);
    assert!(first.iter().all(|&v| v == 2));
    assert!(second.iter().all(|&v| v == 1));
    assert_eq!(first.len(), 8 * 3);
}

#[test]
fn merged_pair_rejects_mismatched_halves() {
    let g = Geometry::from_height(8).unwrap();
    let left = Raster::filled(8, 8, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    let right = Raster::filled(16, 8, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    let err = MergedPair::new(&left, &right, g, "dust").unwrap_err();
    assert!(matches!(err, CloudError::Precondition(_)));
    assert!(err.to_string().contains("dust right"));
}

#[test]
fn blend_channels_places_halves_and_matches_pixel_math() {
    let g = Geometry::from_height(8).unwrap();
    let mut src = sources(8, [125, 0, 0], [200, 0, 50], [10, 90, 200]);
    src.ir_left = Raster::filled(8, 8, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    let field = blend_channels(&src, g).unwrap();
    assert_eq!(field.format(), PixelFormat::Gray8);
    assert_eq!(field.dimensions(), (16, 8));

    let right_value = blend_pixel(&[125, 0, 0], &[200, 0, 50], &[10, 90, 200]);
    let left_value = blend_pixel(&[0, 0, 0], &[200, 0, 50], &[10, 90, 200]);
    assert_ne!(right_value, left_value);
    for y in 0..8 {
        assert!(field.row(y)[..8].iter().all(|&v| v == right_value));
        assert!(field.row(y)[8..].iter().all(|&v| v == left_value));
    }
}

#[test]
fn blend_channels_is_deterministic() {
    let g = Geometry::from_height(16).unwrap();
    let src = sources(16, [150, 10, 10], [120, 30, 90], [60, 61, 62]);
    let a = blend_channels(&src, g).unwrap();
    let b = blend_channels(&src, g).unwrap();
    assert_eq!(a, b);
}

#[test]
fn blend_channels_rejects_wrong_half_size() {
    let g = Geometry::from_height(16).unwrap();
    let src = sources(8, [0; 3], [0; 3], [0; 3]);
    assert!(matches!(
        blend_channels(&src, g),
        Err(CloudError::Precondition(_))
    ));
}
