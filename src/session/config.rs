use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Datelike as _, Utc};

use crate::encode::pyramid::DEFAULT_JPEG_QUALITY;
use crate::foundation::core::Geometry;
use crate::foundation::error::{CloudError, CloudResult};
use crate::render::backend::BackendKind;

pub const DEFAULT_INTERVAL_MINUTES: u64 = 180;

/// Settings for one pipeline and its scheduler, read from JSON.
///
/// Every field is optional in the file; missing fields take the defaults below and unknown
/// fields are rejected.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of the source tree read by [`crate::DirSourceProvider`].
    pub source_root: PathBuf,
    /// Root of the published pyramids.
    pub output_dir: PathBuf,
    pub geometry: Geometry,
    /// Fixed month for the base textures; the run timestamp's month when unset.
    pub month: Option<u32>,
    pub backend: BackendKind,
    pub jpeg_quality: u8,
    /// Also publish the day/night mask as `terminator-mask.png`.
    pub write_terminator_mask: bool,
    pub interval_minutes: u64,
    /// Size of a dedicated rayon pool; the global pool is used when unset.
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("sources"),
            output_dir: PathBuf::from("output"),
            geometry: Geometry::default(),
            month: None,
            backend: BackendKind::Cpu,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            write_terminator_mask: false,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            threads: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> CloudResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CloudError::config(format!("read '{}': {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> CloudResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| CloudError::config(format!("invalid config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CloudResult<()> {
        self.geometry
            .validate()
            .map_err(|e| CloudError::config(format!("geometry: {e}")))?;
        if let Some(month) = self.month
            && !(1..=12).contains(&month)
        {
            return Err(CloudError::config(format!("month must be 1..=12, got {month}")));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(CloudError::config(format!(
                "jpeg_quality must be 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.interval_minutes == 0 {
            return Err(CloudError::config("interval_minutes must be > 0"));
        }
        if self.threads == Some(0) {
            return Err(CloudError::config("threads must be > 0"));
        }
        Ok(())
    }

    /// Month (1..=12) whose base textures a run at `t` uses.
    pub fn month_for(&self, t: DateTime<Utc>) -> u32 {
        self.month.unwrap_or_else(|| t.month())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
