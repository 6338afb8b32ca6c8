use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::assets::sources::{SourceProvider, SourceSet};
use crate::earth::compositor::compose_earth;
use crate::effects::resample::resize_to;
use crate::encode::pyramid::{OutputFormat, PyramidWriter, ResolutionPyramid, Tier};
use crate::foundation::core::{PixelFormat, Raster};
use crate::foundation::error::{CloudError, CloudResult};
use crate::render::backend::{CloudBackend, create_backend};
use crate::session::config::PipelineConfig;
use crate::solar::terminator::{DayNightMask, SolarPosition, blend_day_night, solar_position};

pub const CLOUDS: &str = "clouds";
pub const CLOUDS_ALPHA: &str = "clouds-alpha";
pub const EARTH: &str = "earth";
pub const EARTH_NIGHT: &str = "earth-night";
pub const SPECULAR: &str = "specular";
pub const EARTH_REALTIME: &str = "earth-realtime";
pub const TERMINATOR_MASK: &str = "terminator-mask";

/// What one run published.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub month: u32,
    pub backend: &'static str,
    pub solar: SolarPosition,
    pub artifacts: Vec<ResolutionPyramid>,
    /// Per-file publishing failures; the other files of the run are still published.
    pub failures: Vec<String>,
    /// No earlier day/night pyramid was available, so `earth-realtime` was not written.
    pub realtime_skipped: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn artifact(&self, name: &str) -> Option<&ResolutionPyramid> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Artifact name to combined tier fingerprint.
    pub fn fingerprints(&self) -> BTreeMap<String, u64> {
        self.artifacts
            .iter()
            .map(|a| (a.name.clone(), a.fingerprint()))
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.realtime_skipped
    }
}

/// Result of the real-time day/night stage.
#[derive(Clone, Debug)]
pub enum RealtimeOutcome {
    Published(ResolutionPyramid),
    Skipped,
}

/// One configured pipeline: sources in, pyramids out.
pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn SourceProvider>,
    backend: Box<dyn CloudBackend>,
    writer: PyramidWriter,
    pool: Option<rayon::ThreadPool>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, provider: Arc<dyn SourceProvider>) -> CloudResult<Self> {
        config.validate()?;
        let backend = create_backend(config.backend)?;
        let writer = PyramidWriter::new(&config.output_dir, config.geometry, config.jpeg_quality)?;
        let pool = match config.threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("cloudmap-worker-{i}"))
                    .build()
                    .map_err(|e| CloudError::config(format!("build thread pool: {e}")))?,
            ),
            None => None,
        };
        Ok(Self {
            config,
            provider,
            backend,
            writer,
            pool,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn writer(&self) -> &PyramidWriter {
        &self.writer
    }

    pub fn run_now(&mut self) -> CloudResult<RunReport> {
        self.run_at(Utc::now())
    }

    /// Run every stage for timestamp `t`.
    ///
    /// Acquisition and precondition failures abort before anything is written.
    pub fn run_at(&mut self, t: DateTime<Utc>) -> CloudResult<RunReport> {
        let pool = self.pool.take();
        let res = match &pool {
            Some(p) => p.install(|| self.run_inner(t)),
            None => self.run_inner(t),
        };
        self.pool = pool;
        match &res {
            Err(e) if e.is_fatal_for_run() => error!("run for {t} aborted before publishing: {e}"),
            Err(e) => error!("run for {t} failed: {e}"),
            Ok(_) => {}
        }
        res
    }

    #[tracing::instrument(skip(self))]
    fn run_inner(&mut self, t: DateTime<Utc>) -> CloudResult<RunReport> {
        let started = Instant::now();
        let geometry = self.config.geometry;
        let month = self.config.month_for(t);
        info!(month, backend = self.backend.name(), "run started");

        let sources = SourceSet::load(self.provider.as_ref(), month, geometry)?;
        let clouds =
            self.backend
                .compose_clouds(&sources.channels, &sources.statics.frame, geometry)?;
        let earth = compose_earth(&clouds.clouds_alpha, &sources.statics, geometry)?;
        drop(sources);

        let jpeg = self.writer.jpeg();
        let mut artifacts = Vec::new();
        for (raster, name, format) in [
            (&clouds.clouds, CLOUDS, jpeg),
            (&clouds.clouds_alpha, CLOUDS_ALPHA, OutputFormat::Png),
            (&earth.day, EARTH, jpeg),
            (&earth.night, EARTH_NIGHT, jpeg),
            (&earth.specular, SPECULAR, jpeg),
        ] {
            artifacts.push(self.writer.write(raster, name, format)?);
        }
        drop(clouds);
        drop(earth);

        let solar = solar_position(t);
        info!(
            declination = solar.declination_degrees,
            longitude = solar.subsolar_longitude_degrees,
            "subsolar point"
        );
        let mask = DayNightMask::compute(&solar, geometry.width, geometry.height)?;
        if self.config.write_terminator_mask {
            artifacts.push(
                self.writer
                    .write(&mask.to_gray8()?, TERMINATOR_MASK, OutputFormat::Png)?,
            );
        }

        let published = [EARTH, EARTH_NIGHT].map(|name| artifacts.iter().find(|a| a.name == name));
        let realtime = match published {
            [Some(day), Some(night)] => self.compose_realtime_from(&mask, common_tier(day, night)),
            _ => self.compose_realtime(&mask),
        }?;
        let realtime_skipped = match realtime {
            RealtimeOutcome::Published(pyramid) => {
                artifacts.push(pyramid);
                false
            }
            RealtimeOutcome::Skipped => true,
        };

        let failures: Vec<String> = artifacts
            .iter()
            .flat_map(|a| a.failures.iter().cloned())
            .collect();
        let report = RunReport {
            timestamp: t,
            month,
            backend: self.backend.name(),
            solar,
            artifacts,
            failures,
            realtime_skipped,
            elapsed: started.elapsed(),
        };
        info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            failures = report.failures.len(),
            "run finished"
        );
        Ok(report)
    }

    /// Blend the largest day and night tiers found on disk under `mask`.
    ///
    /// Missing pyramids are a skip, not an error.
    pub fn compose_realtime(&self, mask: &DayNightMask) -> CloudResult<RealtimeOutcome> {
        let jpeg = self.writer.jpeg();
        let tier = self
            .writer
            .largest_available(&[(EARTH, jpeg), (EARTH_NIGHT, jpeg)]);
        self.compose_realtime_from(mask, tier)
    }

    /// Blend the day and night files of `tier`, or skip when there is none.
    pub fn compose_realtime_from(
        &self,
        mask: &DayNightMask,
        tier: Option<Tier>,
    ) -> CloudResult<RealtimeOutcome> {
        let geometry = self.config.geometry;
        let jpeg = self.writer.jpeg();
        let Some(tier) = tier else {
            warn!("no published day/night pyramid, skipping {EARTH_REALTIME}");
            return Ok(RealtimeOutcome::Skipped);
        };
        info!(tier = %tier.key(), "blending day and night");

        let writer = &self.writer;
        let load = |name: &str| -> CloudResult<Raster> {
            let raster = writer.load(tier, name, jpeg, PixelFormat::Rgb8)?;
            resize_to(&raster, geometry)
        };
        let (day, night) = rayon::join(|| load(EARTH), || load(EARTH_NIGHT));
        let blended = match (day, night) {
            (Ok(day), Ok(night)) => blend_day_night(&day, &night, mask)?,
            (Err(e), _) | (_, Err(e)) => {
                warn!("could not read day/night pyramid, skipping {EARTH_REALTIME}: {e}");
                return Ok(RealtimeOutcome::Skipped);
            }
        };
        let pyramid = self.writer.write(&blended, EARTH_REALTIME, jpeg)?;
        Ok(RealtimeOutcome::Published(pyramid))
    }
}

/// Largest tier that both pyramids published.
fn common_tier(day: &ResolutionPyramid, night: &ResolutionPyramid) -> Option<Tier> {
    day.files
        .iter()
        .map(|f| f.tier)
        .filter(|tier| night.files.iter().any(|f| f.tier == *tier))
        .max_by_key(|tier| tier.width)
}

#[cfg(test)]
#[path = "../../tests/unit/session/pipeline.rs"]
mod tests;
