//! Antimeridian seam repair on the intensity field.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::clouds::channels::SENTINEL;
use crate::foundation::core::{Geometry, PixelFormat, Raster};
use crate::foundation::error::CloudResult;
use crate::foundation::math::to_u8;

/// Columns sampled before a gap and non-sentinel pixels required after it.
pub const GAP_BUFFER: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    Searching,
    /// A sentinel run opened the gap; no trailing non-sentinel pixel seen yet.
    InGap { start: isize, start_val: u8 },
    /// Counting non-sentinel pixels after the run.
    Debounce { start: isize, start_val: u8, seen: usize },
}

/// Scan one row left to right and interpolate across every confirmed gap.
///
/// Returns the number of gaps written. Sentinel pixels met while debouncing are ignored.
pub fn fill_row(row: &mut [u8]) -> usize {
    let width = row.len() as isize;
    let mut state = ScanState::Searching;
    let mut filled = 0;

    for x in 0..row.len() {
        let value = row[x];
        state = match state {
            ScanState::Searching if value == SENTINEL => {
                let start_col = x.saturating_sub(GAP_BUFFER);
                ScanState::InGap {
                    start: x as isize - GAP_BUFFER as isize,
                    start_val: row[if x >= GAP_BUFFER { start_col } else { 0 }],
                }
            }
            ScanState::Searching => ScanState::Searching,
            ScanState::InGap { start, start_val } if value != SENTINEL => ScanState::Debounce {
                start,
                start_val,
                seen: 1,
            },
            ScanState::Debounce {
                start,
                start_val,
                seen,
            } if value != SENTINEL => {
                if seen < GAP_BUFFER {
                    ScanState::Debounce {
                        start,
                        start_val,
                        seen: seen + 1,
                    }
                } else {
                    let end = x as isize;
                    if end > start && start >= 0 && end < width {
                        interpolate_span(&mut row[start as usize..=x], start_val, value);
                        filled += 1;
                    }
                    ScanState::Searching
                }
            }
            other => other,
        };
    }
    filled
}

/// Overwrite `span` with evenly spaced values from `from` to `to` inclusive.
fn interpolate_span(span: &mut [u8], from: u8, to: u8) {
    let n = span.len();
    if n == 1 {
        span[0] = from;
        return;
    }
    let (a, b) = (f64::from(from), f64::from(to));
    let step = (b - a) / (n - 1) as f64;
    for (i, px) in span.iter_mut().enumerate() {
        let v = if i == n - 1 { b } else { a + step * i as f64 };
        *px = to_u8(v as f32);
    }
}

/// Repair the seam on every row between the pole bands, in place.
#[tracing::instrument(skip(field))]
pub fn fill_seam(field: &mut Raster, geometry: Geometry) -> CloudResult<usize> {
    field.ensure_format(PixelFormat::Gray8, "intensity field")?;
    field.ensure_geometry(geometry, "intensity field")?;
    let band = geometry.pole_band() as usize;
    let width = geometry.width as usize;
    let rows = geometry.height as usize - 2 * band;

    let data = field.data_mut();
    let gaps: usize = data[band * width..(band + rows) * width]
        .par_chunks_mut(width)
        .map(fill_row)
        .sum();
    debug!(rows, "seam rows scanned");
    info!(gaps, "seam gaps filled");
    Ok(gaps)
}

#[cfg(test)]
#[path = "../../tests/unit/clouds/seam.rs"]
mod tests;
