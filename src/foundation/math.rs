//! Scalar blend arithmetic shared by the host path and mirrored by the GPU shaders.
//!
//! All functions take and return values on the 0..=255 scale as `f32`.

/// Photographic screen blend: `255·(1 − (1 − a/255)(1 − b/255))`.
pub fn screen(a: f32, b: f32) -> f32 {
    let ax = a / 255.0;
    let bx = b / 255.0;
    (1.0 - (1.0 - ax) * (1.0 - bx)) * 255.0
}

/// Multiply blend: `255·(a/255)(b/255)`.
pub fn multiply(a: f32, b: f32) -> f32 {
    a * b / 255.0
}

/// Gamma correction with exponent `1/g`; the normalized input is clamped to `[0, 1]`.
pub fn gamma(g: f32, v: f32) -> f32 {
    let x = (v / 255.0).clamp(0.0, 1.0);
    if x <= 0.0 {
        return 0.0;
    }
    255.0 * x.powf(1.0 / g)
}

/// Map `input` from `[from_a, to_a]` onto `[from_b, to_b]`, clamping outside the source range.
pub fn interpolate(from_a: f32, to_a: f32, from_b: f32, to_b: f32, input: f32) -> f32 {
    if input < from_a {
        return from_b;
    }
    if input > to_a {
        return to_b;
    }
    let t = (input - from_a) / (to_a - from_a);
    from_b + (to_b - from_b) * t
}

/// Clamp to `[0, 255]` and truncate toward zero.
pub fn to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.clamp(0.0, 255.0) as u8
}

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// FNV-1a 64-bit hash used to fingerprint published artifacts.
#[derive(Clone, Copy, Debug)]
pub struct Fnv1a64(u64);

impl Fnv1a64 {
    pub const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;

    pub fn new_default() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= u64::from(b);
            h = h.wrapping_mul(Self::PRIME);
        }
        self.0 = h;
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
