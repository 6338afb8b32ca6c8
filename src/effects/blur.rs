use rayon::prelude::*;

use crate::foundation::core::Raster;
use crate::foundation::error::{CloudError, CloudResult};

/// Gaussian blur over every channel of `src` with standard deviation `sigma`.
///
/// The kernel spans `ceil(3σ)` pixels on each side and edges are clamped. Weights are
/// quantized to Q16 so results are bit-identical across runs and thread counts.
pub fn gaussian_blur(src: &Raster, sigma: f32) -> CloudResult<Raster> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(CloudError::precondition("blur sigma must be >= 0"));
    }
    let radius = (3.0 * sigma).ceil() as u32;
    if radius == 0 {
        return Ok(src.clone());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let (width, height) = src.dimensions();
    let channels = src.channels();
    let mut tmp = vec![0u8; src.data().len()];
    let mut out = vec![0u8; src.data().len()];

    horizontal_pass(src.data(), &mut tmp, width, channels, &kernel);
    vertical_pass(&tmp, &mut out, width, height, channels, &kernel);
    Raster::new(width, height, src.format(), out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> CloudResult<Vec<u32>> {
    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let sigma = sigma as f64;
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = i as f64;
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(CloudError::precondition("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let new_mid = (i64::from(weights[mid]) + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, channels: usize, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let stride = width as usize * channels;
    dst.par_chunks_mut(stride)
        .zip(src.par_chunks(stride))
        .for_each(|(dst_row, src_row)| {
            let mut acc = [0u64; 4];
            for x in 0..w {
                acc[..channels].fill(0);
                for (ki, &kw) in k.iter().enumerate() {
                    let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                    let idx = sx as usize * channels;
                    for c in 0..channels {
                        acc[c] += u64::from(kw) * u64::from(src_row[idx + c]);
                    }
                }
                let out_idx = x as usize * channels;
                for c in 0..channels {
                    dst_row[out_idx + c] = q16_to_u8(acc[c]);
                }
            }
        });
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, channels: usize, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let h = height as i32;
    let stride = width as usize * channels;
    dst.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, dst_row)| {
            let y = y as i32;
            let mut acc = vec![0u64; stride];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1) as usize;
                let src_row = &src[sy * stride..(sy + 1) * stride];
                for (a, &s) in acc.iter_mut().zip(src_row) {
                    *a += u64::from(kw) * u64::from(s);
                }
            }
            for (d, a) in dst_row.iter_mut().zip(acc) {
                *d = q16_to_u8(a);
            }
        });
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    (v.min(255)) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/effects/blur.rs"]
mod tests;
