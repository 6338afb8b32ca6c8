use chrono::TimeZone as _;

use super::*;

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

#[test]
fn equinox_noon_is_near_origin() {
    let sun = solar_position(utc(2024, 3, 20, 12, 0));
    assert!(sun.declination_degrees.abs() < 3.0, "{sun:?}");
    assert!(sun.subsolar_longitude_degrees.abs() < 3.0, "{sun:?}");
}

#[test]
fn solstice_declination_near_tilt() {
    let june = solar_position(utc(2024, 6, 21, 0, 0));
    assert!((june.declination_degrees - 23.44).abs() < 1.0, "{june:?}");
    let december = solar_position(utc(2024, 12, 21, 0, 0));
    assert!((december.declination_degrees + 23.44).abs() < 1.0, "{december:?}");
}

#[test]
fn subsolar_longitude_moves_west_fifteen_degrees_per_hour() {
    let a = solar_position(utc(2024, 5, 1, 10, 0));
    let b = solar_position(utc(2024, 5, 1, 11, 0));
    let delta = normalize_longitude(a.subsolar_longitude_degrees - b.subsolar_longitude_degrees);
    assert!((delta - 15.0).abs() < 1e-9, "{delta}");
    let midnight = solar_position(utc(2024, 5, 1, 0, 0));
    assert!((midnight.subsolar_longitude_degrees.abs() - 180.0).abs() < 5.0);
}

#[test]
fn normalize_wraps_into_range() {
    assert_eq!(normalize_longitude(190.0), -170.0);
    assert_eq!(normalize_longitude(-540.0), -180.0);
    assert_eq!(normalize_longitude(180.0), 180.0);
    assert_eq!(normalize_longitude(725.0), 5.0);
}

#[test]
fn days_since_j2000() {
    let sun = solar_position(utc(2000, 1, 2, 12, 0));
    assert!((sun.days_since_j2000() - 1.0).abs() < 1e-12);
    let before = solar_position(utc(2000, 1, 1, 0, 0));
    assert!((before.days_since_j2000() + 0.5).abs() < 1e-12);
}

#[test]
fn mask_is_one_at_subsolar_point_and_zero_at_antipode() {
    let sun = solar_position(utc(2024, 8, 9, 15, 30));
    let lat = sun.declination_degrees;
    let lon = sun.subsolar_longitude_degrees;
    assert_eq!(mask_value(cos_zenith(lat, lon, &sun)), 1.0);
    let antipode_lon = normalize_longitude(lon + 180.0);
    assert_eq!(mask_value(cos_zenith(-lat, antipode_lon, &sun)), 0.0);
}

#[test]
fn mask_is_symmetric_across_the_terminator() {
    for i in 0..=40 {
        let c = -0.2 + 0.01 * f64::from(i);
        let sum = mask_value(c) + mask_value(-c);
        assert!((sum - 1.0).abs() < 1e-12, "c={c} sum={sum}");
    }
    assert_eq!(mask_value(0.0), 0.5);
}

#[test]
fn grid_mask_stays_in_unit_range_and_brackets_day_and_night() {
    let sun = solar_position(utc(2024, 3, 20, 12, 0));
    let mask = DayNightMask::compute(&sun, 64, 32).unwrap();
    assert_eq!(mask.data().len(), 64 * 32);
    assert!(mask.data().iter().all(|m| (0.0..=1.0).contains(m)));
    // sun near 0° longitude: the grid centre is day, the left and right edges are night
    assert_eq!(mask.value(32, 16), 1.0);
    assert_eq!(mask.value(0, 16), 0.0);
    assert_eq!(mask.value(63, 16), 0.0);
}

#[test]
fn gray_rendering_truncates() {
    let sun = solar_position(utc(2024, 3, 20, 12, 0));
    let mask = DayNightMask::compute(&sun, 16, 8).unwrap();
    let gray = mask.to_gray8().unwrap();
    for (g, m) in gray.data().iter().zip(mask.data()) {
        assert_eq!(*g, (m * 255.0) as u8);
    }
}

#[test]
fn blend_picks_day_and_night_by_mask() {
    let sun = solar_position(utc(2024, 3, 20, 12, 0));
    let mask = DayNightMask::compute(&sun, 64, 32).unwrap();
    let day = Raster::filled(64, 32, PixelFormat::Rgb8, &[200, 180, 160]).unwrap();
    let night = Raster::filled(64, 32, PixelFormat::Rgb8, &[10, 20, 30]).unwrap();
    let out = blend_day_night(&day, &night, &mask).unwrap();
    assert_eq!(out.pixel(32, 16), &[200, 180, 160]);
    assert_eq!(out.pixel(0, 16), &[10, 20, 30]);
    for px in out.data().chunks_exact(3) {
        assert!((10..=200).contains(&px[0]));
    }
}

#[test]
fn blend_rejects_mismatched_sizes() {
    let sun = solar_position(utc(2024, 3, 20, 12, 0));
    let mask = DayNightMask::compute(&sun, 16, 8).unwrap();
    let day = Raster::filled(16, 8, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    let night = Raster::filled(8, 4, PixelFormat::Rgb8, &[0, 0, 0]).unwrap();
    assert!(blend_day_night(&day, &night, &mask).is_err());
}
