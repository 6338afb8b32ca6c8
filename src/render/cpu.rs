use tracing::debug;

use crate::assets::sources::ChannelSources;
use crate::clouds::channels::blend_channels;
use crate::clouds::compositor::{CloudLayers, compose_cloud_layers};
use crate::clouds::hemisphere::reassemble;
use crate::clouds::seam::fill_seam;
use crate::foundation::core::{Geometry, Raster};
use crate::foundation::error::CloudResult;
use crate::render::backend::CloudBackend;

/// Host reference path: blend, seam repair, reassembly, framing.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CloudBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn compose_clouds(
        &mut self,
        channels: &ChannelSources,
        frame: &Raster,
        geometry: Geometry,
    ) -> CloudResult<CloudLayers> {
        let mut field = blend_channels(channels, geometry)?;
        let gaps = fill_seam(&mut field, geometry)?;
        debug!(gaps, "seam repaired");
        reassemble(&mut field, geometry)?;
        compose_cloud_layers(&field, frame, geometry)
    }
}
