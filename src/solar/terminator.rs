//! Subsolar point and day/night mask for a UTC instant.

use chrono::{DateTime, Datelike as _, Timelike as _, Utc};
use rayon::prelude::*;

use crate::foundation::core::{PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};
use crate::foundation::math::to_u8;

/// Axial tilt used for the declination model, in degrees.
pub const OBLIQUITY_DEGREES: f64 = 23.44;
/// Half-width of the civil twilight band, in degrees of solar elevation.
pub const TWILIGHT_DEGREES: f64 = 6.0;

/// 2000-01-01T12:00:00Z as Unix milliseconds.
const J2000_UNIX_MILLIS: i64 = 946_728_000_000;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolarPosition {
    pub declination_degrees: f64,
    pub subsolar_longitude_degrees: f64,
    pub timestamp_utc: DateTime<Utc>,
}

impl SolarPosition {
    /// Fractional days since the J2000.0 epoch.
    pub fn days_since_j2000(&self) -> f64 {
        (self.timestamp_utc.timestamp_millis() - J2000_UNIX_MILLIS) as f64 / MILLIS_PER_DAY
    }
}

/// Equation of time in minutes for a 1-based day of the year.
pub fn equation_of_time_minutes(day_of_year: u32) -> f64 {
    let b = (360.0 * (f64::from(day_of_year) - 81.0) / 365.25).to_radians();
    9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin()
}

pub fn declination_degrees(day_of_year: u32) -> f64 {
    OBLIQUITY_DEGREES * (360.0 * (284.0 + f64::from(day_of_year)) / 365.25).to_radians().sin()
}

/// Wrap a longitude into `[-180, 180]`.
pub fn normalize_longitude(mut lon: f64) -> f64 {
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon < -180.0 {
        lon += 360.0;
    }
    lon
}

pub fn solar_position(t: DateTime<Utc>) -> SolarPosition {
    let day_of_year = t.ordinal();
    let hours = f64::from(t.hour()) + f64::from(t.minute()) / 60.0 + f64::from(t.second()) / 3600.0;
    let solar_time = hours + equation_of_time_minutes(day_of_year) / 60.0;
    let hour_angle = 15.0 * (solar_time - 12.0);
    SolarPosition {
        declination_degrees: declination_degrees(day_of_year),
        subsolar_longitude_degrees: normalize_longitude(-hour_angle),
        timestamp_utc: t,
    }
}

/// Cosine of the solar zenith angle at a point, all angles in degrees.
pub fn cos_zenith(lat: f64, lon: f64, sun: &SolarPosition) -> f64 {
    let (lat, dec) = (lat.to_radians(), sun.declination_degrees.to_radians());
    let dlon = (lon - sun.subsolar_longitude_degrees).to_radians();
    lat.sin() * dec.sin() + lat.cos() * dec.cos() * dlon.cos()
}

/// Map a zenith cosine to the day fraction: 1 in daylight, 0 at night, linear through twilight.
pub fn mask_value(cos_zenith: f64) -> f64 {
    let s = TWILIGHT_DEGREES.to_radians().sin();
    ((cos_zenith + s) / (2.0 * s)).clamp(0.0, 1.0)
}

/// `n` evenly spaced samples over `[from, to]`, endpoints included.
fn linspace(from: f64, to: f64, n: u32) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![from],
        _ => {
            let step = (to - from) / f64::from(n - 1);
            (0..n)
                .map(|i| if i == n - 1 { to } else { from + step * f64::from(i) })
                .collect()
        }
    }
}

/// Per-pixel day fraction over an equirectangular grid (north up, -180° at the left edge).
#[derive(Clone, Debug, PartialEq)]
pub struct DayNightMask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DayNightMask {
    #[tracing::instrument(skip(sun), fields(declination = sun.declination_degrees, longitude = sun.subsolar_longitude_degrees))]
    pub fn compute(sun: &SolarPosition, width: u32, height: u32) -> CloudResult<Self> {
        if width == 0 || height == 0 {
            return Err(CloudError::precondition(format!(
                "mask grid must be non-empty, got {width}x{height}"
            )));
        }
        let lats = linspace(90.0, -90.0, height);
        let dec = sun.declination_degrees.to_radians();
        let (sin_dec, cos_dec) = (dec.sin(), dec.cos());
        let cos_dlon: Vec<f64> = linspace(-180.0, 180.0, width)
            .into_iter()
            .map(|lon| (lon - sun.subsolar_longitude_degrees).to_radians().cos())
            .collect();

        let mut data = vec![0f32; width as usize * height as usize];
        data.par_chunks_mut(width as usize)
            .zip(lats.par_iter())
            .for_each(|(row, &lat)| {
                let lat = lat.to_radians();
                let a = lat.sin() * sin_dec;
                let b = lat.cos() * cos_dec;
                for (m, &c) in row.iter_mut().zip(&cos_dlon) {
                    *m = mask_value(a + b * c) as f32;
                }
            });
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Debug rendering: `mask·255`, truncated.
    pub fn to_gray8(&self) -> CloudResult<Raster> {
        let data = self.data.iter().map(|&m| to_u8(m * 255.0)).collect();
        Raster::new(self.width, self.height, PixelFormat::Gray8, data)
    }
}

/// `day·m + night·(1−m)` per channel.
pub fn blend_day_night(day: &Raster, night: &Raster, mask: &DayNightMask) -> CloudResult<Raster> {
    day.ensure_format(PixelFormat::Rgb8, "day image")?;
    night.ensure_format(PixelFormat::Rgb8, "night image")?;
    let dims = (mask.width, mask.height);
    if day.dimensions() != dims || night.dimensions() != dims {
        return Err(CloudError::precondition(format!(
            "blend inputs {:?} and {:?} do not match mask {dims:?}",
            day.dimensions(),
            night.dimensions()
        )));
    }
    let mut out = vec![0u8; day.data().len()];
    out.par_chunks_exact_mut(3)
        .zip(day.data().par_chunks_exact(3))
        .zip(night.data().par_chunks_exact(3))
        .zip(mask.data.par_iter())
        .for_each(|(((o, d), n), &m)| {
            for c in 0..3 {
                o[c] = to_u8(f32::from(d[c]) * m + f32::from(n[c]) * (1.0 - m));
            }
        });
    Raster::new(mask.width, mask.height, PixelFormat::Rgb8, out)
}

#[cfg(test)]
#[path = "../../tests/unit/solar/terminator.rs"]
mod tests;
