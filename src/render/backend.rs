use crate::assets::sources::ChannelSources;
use crate::clouds::compositor::CloudLayers;
use crate::foundation::core::{Geometry, Raster};
use crate::foundation::error::{CloudError, CloudResult};

/// Turns the six channel halves and the frame mask into the two cloud layers.
pub trait CloudBackend: Send {
    fn name(&self) -> &'static str;

    fn compose_clouds(
        &mut self,
        channels: &ChannelSources,
        frame: &Raster,
        geometry: Geometry,
    ) -> CloudResult<CloudLayers>;
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Cpu,
    Gpu,
}

pub fn create_backend(kind: BackendKind) -> CloudResult<Box<dyn CloudBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::render::cpu::CpuBackend::new())),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Ok(Box::new(crate::render::gpu::GpuBackend::new())),
        #[allow(unreachable_patterns)]
        _ => Err(CloudError::config(
            "gpu backend requested but cloudmap was built without the `gpu` feature",
        )),
    }
}
