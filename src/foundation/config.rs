use std::{fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration};

use crate::foundation::error::{RouteReelError, RouteReelResult};

/// Default Street View Static API endpoint.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://maps.googleapis.com/maps/api/streetview";

/// Top-level settings document.
///
/// Every section falls back to its defaults, so `{}` is a valid settings file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Route sampling density controls.
    pub sampler: SamplerConfig,
    /// Image service (URL builder) parameters.
    pub image: ImageServiceConfig,
    /// Asset cache bounds and fetch behavior.
    pub cache: CacheConfig,
}

impl Settings {
    /// Parse settings from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> RouteReelResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| RouteReelError::serde(format!("parse settings JSON: {e}")))
    }

    /// Parse settings from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> RouteReelResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            RouteReelError::validation(format!("open settings JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Apply `ROUTEREEL_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> RouteReelResult<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `ROUTEREEL_*` overrides using `lookup` as the environment.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> RouteReelResult<()> {
        if let Some(dir) = lookup("ROUTEREEL_CACHE_DIR").filter(|s| !s.is_empty()) {
            self.cache.dir = Some(PathBuf::from(dir));
        }
        if let Some(key) = lookup("ROUTEREEL_IMAGE_KEY").filter(|s| !s.is_empty()) {
            self.image.api_key = Some(key);
        }
        if let Some(url) = lookup("ROUTEREEL_IMAGE_URL").filter(|s| !s.is_empty()) {
            self.image.base_url = url;
        }
        if let Some(v) = lookup("ROUTEREEL_CACHE_MAX_BYTES") {
            self.cache.max_bytes = parse_env_number("ROUTEREEL_CACHE_MAX_BYTES", &v)?;
        }
        if let Some(v) = lookup("ROUTEREEL_BATCH_SIZE") {
            self.cache.batch_size = parse_env_number("ROUTEREEL_BATCH_SIZE", &v)?;
        }
        Ok(())
    }

    /// Validate every section.
    pub fn validate(&self) -> RouteReelResult<()> {
        self.sampler.validate()?;
        self.image.validate()?;
        self.cache.validate()
    }
}

fn parse_env_number<T: std::str::FromStr>(key: &str, value: &str) -> RouteReelResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RouteReelError::validation(format!("{key} must be a number, got '{value}'")))
}

/// Route sampling density controls.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Sampling interval near maneuvers, in meters.
    pub base_interval_m: f64,
    /// Multiplier applied to `base_interval_m` away from maneuvers.
    pub sparse_factor: f64,
    /// Distance within which a point counts as near a maneuver.
    pub approach_radius_m: f64,
    /// Distance to the final step within which a destination context is synthesized.
    pub destination_radius_m: f64,
    /// Decimal places used by the de-duplication grid.
    pub quantize_decimals: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            base_interval_m: 20.0,
            sparse_factor: 5.0,
            approach_radius_m: 50.0,
            destination_radius_m: 150.0,
            quantize_decimals: 4,
        }
    }
}

impl SamplerConfig {
    /// Copy of this config with a different base interval.
    pub fn with_base_interval(&self, base_interval_m: f64) -> Self {
        Self {
            base_interval_m,
            ..self.clone()
        }
    }

    /// Interval used away from maneuvers.
    pub fn sparse_interval_m(&self) -> f64 {
        self.base_interval_m * self.sparse_factor
    }

    /// Check ranges.
    pub fn validate(&self) -> RouteReelResult<()> {
        if !self.base_interval_m.is_finite() || self.base_interval_m <= 0.0 {
            return Err(RouteReelError::validation(
                "sampler base_interval_m must be finite and > 0",
            ));
        }
        if !self.sparse_factor.is_finite() || self.sparse_factor < 1.0 {
            return Err(RouteReelError::validation(
                "sampler sparse_factor must be finite and >= 1",
            ));
        }
        if !self.approach_radius_m.is_finite() || self.approach_radius_m < 0.0 {
            return Err(RouteReelError::validation(
                "sampler approach_radius_m must be finite and >= 0",
            ));
        }
        if !self.destination_radius_m.is_finite() || self.destination_radius_m < 0.0 {
            return Err(RouteReelError::validation(
                "sampler destination_radius_m must be finite and >= 0",
            ));
        }
        if self.quantize_decimals > 9 {
            return Err(RouteReelError::validation(
                "sampler quantize_decimals must be <= 9",
            ));
        }
        Ok(())
    }
}

/// Output image dimensions requested from the image service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Image service (URL builder) parameters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ImageServiceConfig {
    /// Endpoint that serves a street-level image for query parameters.
    pub base_url: String,
    /// Credential appended as `key=`; required when `require_key` is set.
    pub api_key: Option<String>,
    /// Refuse to build references without an API key.
    pub require_key: bool,
    /// Requested image size.
    pub size: ImageSize,
    /// Camera pitch in degrees.
    pub pitch_deg: f64,
    /// Horizontal field of view in degrees.
    pub fov_deg: f64,
    /// Search radius when resolving panoramas near a point.
    pub panorama_radius_m: f64,
}

impl Default for ImageServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            api_key: None,
            require_key: false,
            size: ImageSize {
                width: 640,
                height: 640,
            },
            pitch_deg: 0.0,
            fov_deg: 90.0,
            panorama_radius_m: 50.0,
        }
    }
}

impl ImageServiceConfig {
    /// Check ranges.
    pub fn validate(&self) -> RouteReelResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(RouteReelError::validation("image base_url must be non-empty"));
        }
        if self.size.width == 0 || self.size.height == 0 {
            return Err(RouteReelError::validation("image size must be non-zero"));
        }
        if !self.pitch_deg.is_finite() || !(-90.0..=90.0).contains(&self.pitch_deg) {
            return Err(RouteReelError::validation(
                "image pitch_deg must be within [-90, 90]",
            ));
        }
        if !self.fov_deg.is_finite() || self.fov_deg <= 0.0 || self.fov_deg > 120.0 {
            return Err(RouteReelError::validation(
                "image fov_deg must be within (0, 120]",
            ));
        }
        Ok(())
    }
}

/// Bounded exponential backoff.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Asset cache bounds and fetch behavior.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// On-disk location; `None` uses the platform cache directory.
    pub dir: Option<PathBuf>,
    /// Size budget across all stored payloads.
    pub max_bytes: u64,
    /// Entries older than this are treated as absent on read.
    pub max_age_secs: u64,
    /// Concurrent fetches per batch.
    pub batch_size: usize,
    /// Eviction stops once total size is at or below `max_bytes * evict_to_ratio`.
    pub evict_to_ratio: f64,
    /// Reject payloads that are not a recognizable image format.
    pub verify_image_payload: bool,
    /// Per-request network timeout.
    pub request_timeout_secs: u64,
    /// Retry policy for transient network failures.
    pub retry: RetryPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_bytes: 100 * 1024 * 1024,
            max_age_secs: 7 * 24 * 60 * 60,
            batch_size: 5,
            evict_to_ratio: 0.8,
            verify_image_payload: true,
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Maximum entry age in milliseconds.
    pub fn max_age_ms(&self) -> u64 {
        self.max_age_secs.saturating_mul(1000)
    }

    /// Size that eviction shrinks the store down to.
    pub fn evict_target_bytes(&self) -> u64 {
        (self.max_bytes as f64 * self.evict_to_ratio).floor() as u64
    }

    /// Explicit `dir`, or the per-user cache directory for this application.
    pub fn resolve_dir(&self) -> RouteReelResult<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }
        let dirs = directories::ProjectDirs::from("dev", "routereel", "routereel").ok_or_else(
            || RouteReelError::cache_storage("no home directory to place the asset cache in"),
        )?;
        Ok(dirs.cache_dir().join("images"))
    }

    /// Check ranges.
    pub fn validate(&self) -> RouteReelResult<()> {
        if self.max_bytes == 0 {
            return Err(RouteReelError::validation("cache max_bytes must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(RouteReelError::validation("cache batch_size must be > 0"));
        }
        if !self.evict_to_ratio.is_finite() || !(0.0..=1.0).contains(&self.evict_to_ratio) {
            return Err(RouteReelError::validation(
                "cache evict_to_ratio must be within [0, 1]",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RouteReelError::validation(
                "cache retry.max_attempts must be >= 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
