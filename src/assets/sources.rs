use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rayon::prelude::*;
use tracing::{debug, error, info};

use crate::assets::decode::{decode_raster, decode_sized};
use crate::foundation::core::{Geometry, PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};

/// Every input a run needs: six hemisphere channel halves and four static textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    IrLeft,
    IrRight,
    DustLeft,
    DustRight,
    VisibleLeft,
    VisibleRight,
    Frame,
    DayBase,
    NightBase,
    SpecularBase,
}

impl SourceKind {
    pub const ALL: [SourceKind; 10] = [
        Self::IrLeft,
        Self::IrRight,
        Self::DustLeft,
        Self::DustRight,
        Self::VisibleLeft,
        Self::VisibleRight,
        Self::Frame,
        Self::DayBase,
        Self::NightBase,
        Self::SpecularBase,
    ];

    /// Remote satellite channel halves, as opposed to local static textures.
    pub fn is_channel(self) -> bool {
        !matches!(
            self,
            Self::Frame | Self::DayBase | Self::NightBase | Self::SpecularBase
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::IrLeft => "ir-left",
            Self::IrRight => "ir-right",
            Self::DustLeft => "dust-left",
            Self::DustRight => "dust-right",
            Self::VisibleLeft => "visible-left",
            Self::VisibleRight => "visible-right",
            Self::Frame => "frame",
            Self::DayBase => "earth",
            Self::NightBase => "earth-night",
            Self::SpecularBase => "specular-base",
        }
    }

    /// Pixel format a source is normalized to when decoded.
    pub fn pixel_format(self) -> PixelFormat {
        match self {
            Self::Frame => PixelFormat::Rgba8,
            _ => PixelFormat::Rgb8,
        }
    }
}

/// Hands the pipeline the encoded bytes of one source.
///
/// Acquisition (network fetches, caches, retries) lives behind this trait; the pipeline itself
/// never opens a network connection.
pub trait SourceProvider: Send + Sync {
    /// Return the encoded image for `kind`. Month-indexed textures use `month` (1..=12).
    fn fetch(&self, kind: SourceKind, month: u32) -> CloudResult<Vec<u8>>;
}

/// Reads sources from a directory tree:
///
/// ```text
/// <root>/channels/{ir,dust,visible}-{left,right}.png
/// <root>/static/frame.png
/// <root>/static/monthly/{earth,earth-night,specular-base}/<month>.jpg
/// ```
#[derive(Clone, Debug)]
pub struct DirSourceProvider {
    root: PathBuf,
}

impl DirSourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: SourceKind, month: u32) -> PathBuf {
        if kind.is_channel() {
            return self
                .root
                .join("channels")
                .join(format!("{}.png", kind.label()));
        }
        match kind {
            SourceKind::Frame => self.root.join("static").join("frame.png"),
            _ => self
                .root
                .join("static")
                .join("monthly")
                .join(kind.label())
                .join(format!("{month}.jpg")),
        }
    }
}

impl SourceProvider for DirSourceProvider {
    fn fetch(&self, kind: SourceKind, month: u32) -> CloudResult<Vec<u8>> {
        let path = self.path_for(kind, month);
        std::fs::read(&path)
            .with_context(|| format!("read {} from '{}'", kind.label(), path.display()))
            .map_err(|e| CloudError::acquisition(format!("{e:#}")))
    }
}

/// In-memory provider for collaborators that already hold the encoded buffers.
#[derive(Clone, Debug, Default)]
pub struct MemorySourceProvider {
    buffers: HashMap<SourceKind, Vec<u8>>,
}

impl MemorySourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: SourceKind, bytes: Vec<u8>) {
        self.buffers.insert(kind, bytes);
    }

    pub fn with(mut self, kind: SourceKind, bytes: Vec<u8>) -> Self {
        self.insert(kind, bytes);
        self
    }
}

impl SourceProvider for MemorySourceProvider {
    fn fetch(&self, kind: SourceKind, _month: u32) -> CloudResult<Vec<u8>> {
        self.buffers
            .get(&kind)
            .cloned()
            .ok_or_else(|| CloudError::acquisition(format!("no buffer for {}", kind.label())))
    }
}

/// The six hemisphere halves, each `height`×`height` RGB.
#[derive(Clone, Debug)]
pub struct ChannelSources {
    pub ir_left: Raster,
    pub ir_right: Raster,
    pub dust_left: Raster,
    pub dust_right: Raster,
    pub visible_left: Raster,
    pub visible_right: Raster,
}

/// Static textures: the frame mask and the month's base textures (any size).
#[derive(Clone, Debug)]
pub struct StaticTextures {
    pub frame: Raster,
    pub day_base: Raster,
    pub night_base: Raster,
    pub specular_base: Raster,
}

/// Every decoded input of one run.
#[derive(Clone, Debug)]
pub struct SourceSet {
    pub channels: ChannelSources,
    pub statics: StaticTextures,
}

impl SourceSet {
    /// Fetch and decode all ten sources concurrently.
    ///
    /// Nothing is returned until every load has finished; a single failure fails the whole set.
    #[tracing::instrument(skip(provider))]
    pub fn load(provider: &dyn SourceProvider, month: u32, geometry: Geometry) -> CloudResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(CloudError::config(format!("month must be 1..=12, got {month}")));
        }
        let results: Vec<(SourceKind, CloudResult<Raster>)> = SourceKind::ALL
            .par_iter()
            .map(|&kind| (kind, load_one(provider, kind, month, geometry)))
            .collect();

        let mut loaded = HashMap::with_capacity(results.len());
        let mut failures = Vec::new();
        for (kind, res) in results {
            match res {
                Ok(raster) => {
                    debug!(source = kind.label(), w = raster.width(), h = raster.height(), "loaded");
                    loaded.insert(kind, raster);
                }
                Err(e) => {
                    error!(source = kind.label(), "source load failed: {e}");
                    failures.push(format!("{}: {e}", kind.label()));
                }
            }
        }
        if !failures.is_empty() {
            return Err(CloudError::acquisition(failures.join("; ")));
        }
        info!("all {} sources loaded", loaded.len());

        let mut take = |kind: SourceKind| {
            loaded
                .remove(&kind)
                .ok_or_else(|| CloudError::acquisition(format!("{} missing", kind.label())))
        };
        Ok(Self {
            channels: ChannelSources {
                ir_left: take(SourceKind::IrLeft)?,
                ir_right: take(SourceKind::IrRight)?,
                dust_left: take(SourceKind::DustLeft)?,
                dust_right: take(SourceKind::DustRight)?,
                visible_left: take(SourceKind::VisibleLeft)?,
                visible_right: take(SourceKind::VisibleRight)?,
            },
            statics: StaticTextures {
                frame: take(SourceKind::Frame)?,
                day_base: take(SourceKind::DayBase)?,
                night_base: take(SourceKind::NightBase)?,
                specular_base: take(SourceKind::SpecularBase)?,
            },
        })
    }
}

fn load_one(
    provider: &dyn SourceProvider,
    kind: SourceKind,
    month: u32,
    geometry: Geometry,
) -> CloudResult<Raster> {
    let bytes = provider.fetch(kind, month)?;
    if kind.is_channel() {
        decode_sized(&bytes, kind.pixel_format(), geometry.height, geometry.height)
    } else {
        decode_raster(&bytes, kind.pixel_format())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/sources.rs"]
mod tests;
