pub mod backend;
pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;
