#![forbid(unsafe_code)]

pub mod assets;
pub mod clouds;
pub mod earth;
pub mod effects;
pub mod encode;
pub mod foundation;
pub mod logging;
pub mod render;
pub mod session;
pub mod solar;

pub use assets::sources::{
    ChannelSources, DirSourceProvider, MemorySourceProvider, SourceKind, SourceProvider,
    SourceSet, StaticTextures,
};
pub use clouds::compositor::CloudLayers;
pub use earth::compositor::EarthLayers;
pub use encode::pyramid::{OutputFormat, PyramidWriter, ResolutionPyramid, Tier};
pub use foundation::core::{Geometry, PixelFormat, Raster, SOURCE_HEIGHT, SOURCE_WIDTH};
pub use foundation::error::{CloudError, CloudResult};
pub use render::backend::{BackendKind, CloudBackend, create_backend};
pub use session::config::PipelineConfig;
pub use session::pipeline::{Pipeline, RealtimeOutcome, RunReport};
pub use session::runner::{JobRunner, RunState, Scheduler, TriggerOutcome};
pub use solar::terminator::{DayNightMask, SolarPosition, solar_position};
