use super::*;

fn samples() -> impl Iterator<Item = f32> {
    (0..=255).map(|v| v as f32)
}

#[test]
fn blends_stay_in_range() {
    for a in samples().step_by(5) {
        for b in samples().step_by(5) {
            let s = screen(a, b);
            let m = multiply(a, b);
            assert!((0.0..=255.0 + 1e-3).contains(&s), "screen({a},{b})={s}");
            assert!((0.0..=255.0 + 1e-3).contains(&m), "multiply({a},{b})={m}");
        }
    }
}

#[test]
fn gamma_stays_in_range_and_fixes_endpoints() {
    for g in [1.0f32, 1.46, 1.5, 2.0] {
        for v in samples() {
            let out = gamma(g, v);
            assert!((0.0..=255.0 + 1e-3).contains(&out));
        }
        assert_eq!(gamma(g, 0.0), 0.0);
        assert!((gamma(g, 255.0) - 255.0).abs() < 1e-3);
    }
    assert_eq!(gamma(2.0, -40.0), 0.0);
    assert!((gamma(2.0, 400.0) - 255.0).abs() < 1e-3);
}

#[test]
fn screen_with_black_is_identity_and_with_white_saturates() {
    assert!((screen(120.0, 0.0) - 120.0).abs() < 1e-3);
    assert!((screen(120.0, 255.0) - 255.0).abs() < 1e-3);
}

#[test]
fn interpolate_clamps_outside_source_range() {
    assert_eq!(interpolate(72.0, 178.0, 0.0, 255.0, 10.0), 0.0);
    assert_eq!(interpolate(72.0, 178.0, 0.0, 255.0, 200.0), 255.0);
    assert!((interpolate(72.0, 178.0, 0.0, 255.0, 125.0) - 127.5).abs() < 1e-4);
}

#[test]
fn to_u8_clamps_and_truncates() {
    assert_eq!(to_u8(-3.0), 0);
    assert_eq!(to_u8(254.9), 254);
    assert_eq!(to_u8(300.0), 255);
    assert_eq!(to_u8(f32::NAN), 0);
}

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u8(255, 255), 255);
    assert_eq!(mul_div255_u8(128, 255), 128);
    assert_eq!(mul_div255_u8(1, 127), 0);
    assert_eq!(mul_div255_u8(1, 128), 1);
}

#[test]
fn fnv_is_order_sensitive() {
    let mut a = Fnv1a64::new_default();
    a.write_bytes(&[1, 2]);
    let mut b = Fnv1a64::new_default();
    b.write_bytes(&[2, 1]);
    assert_ne!(a.finish(), b.finish());
    assert_eq!(Fnv1a64::new_default().finish(), Fnv1a64::OFFSET_BASIS);
}

#[test]
fn multiply_is_exact_on_whole_products() {
    assert_eq!(multiply(200.0, 204.0), 160.0);
    assert_eq!(multiply(40.0, 255.0), 40.0);
    assert_eq!(multiply(255.0, 0.0), 0.0);
}
