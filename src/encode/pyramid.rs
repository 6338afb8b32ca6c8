//! Multi-resolution publishing: every artifact is written at full, half, quarter and eighth
//! size under `<root>/<width>x<height>/<name>.<ext>`.

use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder as _};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::assets::decode::decode_raster;
use crate::effects::resample::resize;
use crate::foundation::core::{Geometry, PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};
use crate::foundation::math::Fnv1a64;

/// Downscale factors, largest tier first.
pub const TIER_SCALES: [u32; 4] = [1, 2, 4, 8];
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg { quality: u8 },
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }

    fn accepts(self, format: PixelFormat) -> bool {
        match self {
            Self::Jpeg { .. } => !format.has_alpha(),
            Self::Png => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tier {
    pub scale: u32,
    pub width: u32,
    pub height: u32,
}

impl Tier {
    /// Directory key for this tier.
    pub fn key(self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// One file of a pyramid that made it to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedFile {
    pub tier: Tier,
    pub path: PathBuf,
    /// FNV-1a over the tier's pixel data (before encoding).
    pub fingerprint: u64,
}

/// Result of publishing one artifact. Tiers fail independently.
#[derive(Clone, Debug, Default)]
pub struct ResolutionPyramid {
    pub name: String,
    pub files: Vec<PublishedFile>,
    pub failures: Vec<String>,
}

impl ResolutionPyramid {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.files.len() == TIER_SCALES.len()
    }

    /// Combined fingerprint of every written tier, in tier order.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1a64::new_default();
        for f in &self.files {
            h.write_u32(f.tier.scale);
            h.write_bytes(&f.fingerprint.to_le_bytes());
        }
        h.finish()
    }
}

#[derive(Clone, Debug)]
pub struct PyramidWriter {
    root: PathBuf,
    geometry: Geometry,
    jpeg_quality: u8,
}

impl PyramidWriter {
    pub fn new(root: impl Into<PathBuf>, geometry: Geometry, jpeg_quality: u8) -> CloudResult<Self> {
        geometry.validate()?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(CloudError::config(format!(
                "jpeg quality must be 1..=100, got {jpeg_quality}"
            )));
        }
        Ok(Self {
            root: root.into(),
            geometry,
            jpeg_quality,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jpeg(&self) -> OutputFormat {
        OutputFormat::Jpeg {
            quality: self.jpeg_quality,
        }
    }

    pub fn tiers(&self) -> Vec<Tier> {
        TIER_SCALES
            .iter()
            .map(|&scale| Tier {
                scale,
                width: (self.geometry.width / scale).max(1),
                height: (self.geometry.height / scale).max(1),
            })
            .collect()
    }

    pub fn tier_dir(&self, tier: Tier) -> PathBuf {
        self.root.join(tier.key())
    }

    pub fn path_for(&self, tier: Tier, name: &str, format: OutputFormat) -> PathBuf {
        self.tier_dir(tier)
            .join(format!("{name}.{}", format.extension()))
    }

    /// Resize `raster` to every tier and publish each file atomically.
    ///
    /// A tier that fails to resize, encode or persist is recorded in `failures` and leaves any
    /// existing file at its path untouched.
    #[tracing::instrument(skip(self, raster))]
    pub fn write(
        &self,
        raster: &Raster,
        name: &str,
        format: OutputFormat,
    ) -> CloudResult<ResolutionPyramid> {
        raster.ensure_geometry(self.geometry, name)?;
        if !format.accepts(raster.format()) {
            return Err(CloudError::precondition(format!(
                "{name}: {:?} cannot be written as {}",
                raster.format(),
                format.extension()
            )));
        }

        let results: Vec<(Tier, CloudResult<PublishedFile>)> = self
            .tiers()
            .into_par_iter()
            .map(|tier| (tier, self.write_tier(raster, tier, name, format)))
            .collect();

        let mut pyramid = ResolutionPyramid {
            name: name.to_owned(),
            ..ResolutionPyramid::default()
        };
        for (tier, res) in results {
            match res {
                Ok(file) => {
                    debug!(path = %file.path.display(), "tier written");
                    pyramid.files.push(file);
                }
                Err(e) => {
                    warn!(tier = %tier.key(), "failed to publish {name}: {e}");
                    pyramid.failures.push(format!("{name} {}: {e}", tier.key()));
                }
            }
        }
        Ok(pyramid)
    }

    fn write_tier(
        &self,
        raster: &Raster,
        tier: Tier,
        name: &str,
        format: OutputFormat,
    ) -> CloudResult<PublishedFile> {
        let resized = resize(raster, tier.width, tier.height)?;
        let mut h = Fnv1a64::new_default();
        h.write_bytes(resized.data());
        let encoded = encode(&resized, format)?;
        let path = self.path_for(tier, name, format);
        write_atomic(&path, &encoded)?;
        Ok(PublishedFile {
            tier,
            path,
            fingerprint: h.finish(),
        })
    }

    /// Largest tier for which every named file exists.
    pub fn largest_available(&self, names: &[(&str, OutputFormat)]) -> Option<Tier> {
        self.tiers().into_iter().find(|&tier| {
            names
                .iter()
                .all(|&(name, format)| self.path_for(tier, name, format).is_file())
        })
    }

    /// Read back a published tier.
    pub fn load(
        &self,
        tier: Tier,
        name: &str,
        format: OutputFormat,
        pixel_format: PixelFormat,
    ) -> CloudResult<Raster> {
        let path = self.path_for(tier, name, format);
        let bytes = std::fs::read(&path).map_err(|e| {
            CloudError::acquisition(format!("read '{}': {e}", path.display()))
        })?;
        decode_raster(&bytes, pixel_format)
    }
}

/// Encode a raster into an in-memory file.
pub fn encode(raster: &Raster, format: OutputFormat) -> CloudResult<Vec<u8>> {
    let color = match raster.format() {
        PixelFormat::Gray8 => ExtendedColorType::L8,
        PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
        PixelFormat::Rgba8 => ExtendedColorType::Rgba8,
    };
    let mut out = Vec::new();
    let (w, h) = raster.dimensions();
    let res = match format {
        OutputFormat::Jpeg { quality } => {
            JpegEncoder::new_with_quality(&mut out, quality).write_image(raster.data(), w, h, color)
        }
        OutputFormat::Png => PngEncoder::new(&mut out).write_image(raster.data(), w, h, color),
    };
    res.map_err(|e| CloudError::encode(format!("{} encode failed: {e}", format.extension())))?;
    Ok(out)
}

/// Write `bytes` to a temporary file beside `path`, then rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> CloudResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CloudError::encode(format!("'{}' has no parent", path.display())))?;
    std::fs::create_dir_all(dir)
        .map_err(|e| CloudError::encode(format!("create '{}': {e}", dir.display())))?;

    let tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| CloudError::encode(format!("temp file in '{}': {e}", dir.display())))?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        w.write_all(bytes)
            .and_then(|()| w.flush())
            .map_err(|e| CloudError::encode(format!("write '{}': {e}", path.display())))?;
    }
    tmp.persist(path)
        .map_err(|e| CloudError::encode(format!("replace '{}': {}", path.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/pyramid.rs"]
mod tests;
