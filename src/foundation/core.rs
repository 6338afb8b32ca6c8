use crate::foundation::error::{CloudError, CloudResult};

/// Full working width of the equirectangular globe.
pub const SOURCE_WIDTH: u32 = 8192;
/// Full working height; each hemisphere channel raster is `SOURCE_HEIGHT` square.
pub const SOURCE_HEIGHT: u32 = SOURCE_WIDTH / 2;

/// Working dimensions shared by every raster until the pyramid stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Geometry {
    /// Width in pixels, always twice the height.
    pub width: u32,
    /// Height in pixels, a non-zero multiple of 8.
    pub height: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: SOURCE_WIDTH,
            height: SOURCE_HEIGHT,
        }
    }
}

impl Geometry {
    /// Create a validated geometry.
    pub fn new(width: u32, height: u32) -> CloudResult<Self> {
        let g = Self { width, height };
        g.validate()?;
        Ok(g)
    }

    /// Geometry for a globe assembled from two `height`×`height` halves.
    pub fn from_height(height: u32) -> CloudResult<Self> {
        let width = height
            .checked_mul(2)
            .ok_or_else(|| CloudError::precondition("geometry width overflow"))?;
        Self::new(width, height)
    }

    pub fn validate(self) -> CloudResult<()> {
        if self.height == 0 || !self.height.is_multiple_of(8) {
            return Err(CloudError::precondition(format!(
                "geometry height must be a non-zero multiple of 8, got {}",
                self.height
            )));
        }
        if self.width != self.height.saturating_mul(2) {
            return Err(CloudError::precondition(format!(
                "geometry width must be twice the height, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Width of one hemisphere half.
    pub fn half_width(self) -> u32 {
        self.width / 2
    }

    /// Height of the polar band that is excluded from seam repair and mirrored.
    pub fn pole_band(self) -> u32 {
        self.height / 8
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Pixel layouts for 8-bit rasters. Float rasters are modelled separately by
/// [`crate::DayNightMask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba8)
    }
}

/// An 8-bit raster with fixed dimensions and an explicit pixel format.
///
/// The buffer length always equals `width * height * format.channels()`; this is checked when
/// the raster is built and cannot be broken afterwards because the fields are private.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Raster {
    /// Wrap an existing buffer, validating its length.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> CloudResult<Self> {
        let expected = buffer_len(width, height, format)?;
        if data.len() != expected {
            return Err(CloudError::precondition(format!(
                "{format:?} raster {width}x{height} expects {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A raster with every pixel set to `px`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, px: &[u8]) -> CloudResult<Self> {
        if px.len() != format.channels() {
            return Err(CloudError::precondition(format!(
                "fill pixel has {} channels, {format:?} needs {}",
                px.len(),
                format.channels()
            )));
        }
        let n = buffer_len(width, height, format)? / format.channels();
        Self::new(width, height, format, px.repeat(n))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.format.channels();
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    /// Check that the raster matches `geometry` exactly.
    pub fn ensure_geometry(&self, geometry: Geometry, what: &str) -> CloudResult<()> {
        if self.width != geometry.width || self.height != geometry.height {
            return Err(CloudError::precondition(format!(
                "{what} is {}x{}, working geometry is {}x{}",
                self.width, self.height, geometry.width, geometry.height
            )));
        }
        Ok(())
    }

    pub fn ensure_format(&self, format: PixelFormat, what: &str) -> CloudResult<()> {
        if self.format != format {
            return Err(CloudError::precondition(format!(
                "{what} must be {format:?}, got {:?}",
                self.format
            )));
        }
        Ok(())
    }

    /// Convert to another pixel format.
    ///
    /// Gray expands to equal RGB, RGB gains an opaque alpha, alpha is dropped when narrowing and
    /// colour narrows to gray by taking the red channel (rasters here are grayscale when they are
    /// narrowed).
    pub fn to_format(&self, format: PixelFormat) -> Raster {
        if format == self.format {
            return self.clone();
        }
        let src_c = self.format.channels();
        let dst_c = format.channels();
        let mut data = Vec::with_capacity(self.data.len() / src_c * dst_c);
        for px in self.data.chunks_exact(src_c) {
            let (r, g, b, a) = match self.format {
                PixelFormat::Gray8 => (px[0], px[0], px[0], 255),
                PixelFormat::Rgb8 => (px[0], px[1], px[2], 255),
                PixelFormat::Rgba8 => (px[0], px[1], px[2], px[3]),
            };
            match format {
                PixelFormat::Gray8 => data.push(r),
                PixelFormat::Rgb8 => data.extend_from_slice(&[r, g, b]),
                PixelFormat::Rgba8 => data.extend_from_slice(&[r, g, b, a]),
            }
        }
        Raster {
            width: self.width,
            height: self.height,
            format,
            data,
        }
    }

    /// Extract one channel as a gray raster.
    pub fn channel(&self, index: usize) -> CloudResult<Raster> {
        let c = self.format.channels();
        if index >= c {
            return Err(CloudError::precondition(format!(
                "channel {index} out of range for {:?}",
                self.format
            )));
        }
        let data = self.data.chunks_exact(c).map(|px| px[index]).collect();
        Raster::new(self.width, self.height, PixelFormat::Gray8, data)
    }
}

fn buffer_len(width: u32, height: u32, format: PixelFormat) -> CloudResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(format.channels()))
        .ok_or_else(|| CloudError::precondition("raster buffer size overflow"))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
