use std::{io::Write, path::Path};

use tokio_util::sync::CancellationToken;

use crate::{
    assets::{
        cache::{AssetCache, CacheProgress, Clock},
        fetch::AssetFetcher,
        storage::CacheStorage,
    },
    foundation::{
        config::Settings,
        core::{Coordinate, Route},
        error::{RouteReelError, RouteReelResult},
    },
    frames::{
        builder::{Frame, FrameBuilder},
        image_ref::{ImageResolver, ImageUrlBuilder},
    },
    routing::provider::{RoutePlanner, RoutingProvider},
    sample::sampler::{RouteSampler, SampledPoint},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Per-run counters stored next to the frames.
pub struct ManifestStats {
    /// Points produced by the sampler.
    pub sampled: usize,
    /// Frames emitted.
    pub emitted: usize,
    /// Points dropped because no image reference could be resolved.
    pub dropped: usize,
    /// Frames whose image is in the local cache.
    pub cached: usize,
    /// Frames whose image could not be cached.
    pub cache_failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// Playable frame sequence plus run counters.
pub struct FrameManifest {
    /// Frames in route order.
    pub frames: Vec<Frame>,
    /// Run counters.
    pub stats: ManifestStats,
}

impl FrameManifest {
    fn from_frames(frames: Vec<Frame>, sampled: usize, dropped: usize) -> Self {
        let emitted = frames.len();
        Self {
            frames,
            stats: ManifestStats {
                sampled,
                emitted,
                dropped,
                ..ManifestStats::default()
            },
        }
    }

    /// Parse a manifest from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> RouteReelResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| RouteReelError::serde(format!("parse manifest JSON: {e}")))
    }

    /// Write the manifest as pretty JSON.
    pub fn to_writer_pretty<W: Write>(&self, w: W) -> RouteReelResult<()> {
        serde_json::to_writer_pretty(w, self)
            .map_err(|e| RouteReelError::serde(format!("write manifest JSON: {e}")))
    }

    /// Write the manifest to `path`.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> RouteReelResult<()> {
        let path = path.as_ref();
        let f = std::fs::File::create(path).map_err(|e| {
            RouteReelError::validation(format!("create manifest '{}': {e}", path.display()))
        })?;
        let mut w = std::io::BufWriter::new(f);
        self.to_writer_pretty(&mut w)?;
        w.flush()
            .map_err(|e| RouteReelError::validation(format!("flush manifest: {e}")))
    }

    /// Image references of all frames, in order.
    pub fn image_refs(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|f| f.image_ref.as_str())
    }
}

/// Route → frames pipeline: sampler, image reference builder and frame builder.
#[derive(Clone, Debug)]
pub struct FramePipeline {
    sampler: RouteSampler,
    urls: ImageUrlBuilder,
    builder: FrameBuilder,
}

impl Default for FramePipeline {
    fn default() -> Self {
        let urls = ImageUrlBuilder::keyless();
        Self {
            sampler: RouteSampler::default(),
            builder: FrameBuilder::new(urls.config().pitch_deg),
            urls,
        }
    }
}

impl FramePipeline {
    /// Pipeline from validated settings.
    pub fn new(settings: &Settings) -> RouteReelResult<Self> {
        settings.validate()?;
        let urls = ImageUrlBuilder::new(settings.image.clone())?;
        Ok(Self {
            sampler: RouteSampler::new(settings.sampler.clone()),
            builder: FrameBuilder::new(settings.image.pitch_deg),
            urls,
        })
    }

    /// Image reference builder.
    pub fn urls(&self) -> &ImageUrlBuilder {
        &self.urls
    }

    /// Configured sampler.
    pub fn sampler(&self) -> &RouteSampler {
        &self.sampler
    }

    fn sampler_for(&self, base_interval_m: f64) -> RouteSampler {
        let cfg = self.sampler.config();
        if base_interval_m.is_finite() && base_interval_m > 0.0 {
            RouteSampler::new(cfg.with_base_interval(base_interval_m))
        } else {
            tracing::warn!(
                base_interval_m,
                fallback = cfg.base_interval_m,
                "ignoring non-positive base interval"
            );
            self.sampler.clone()
        }
    }

    fn sample_points(&self, route: &Route, base_interval_m: f64) -> Vec<SampledPoint> {
        self.sampler_for(base_interval_m).sample(route)
    }

    /// Frames for `route` with references from the URL builder.
    pub fn sample_route(&self, route: &Route, base_interval_m: f64) -> Vec<Frame> {
        self.manifest(route, base_interval_m).frames
    }

    /// [`FramePipeline::sample_route`] with run counters.
    pub fn manifest(&self, route: &Route, base_interval_m: f64) -> FrameManifest {
        let points = self.sample_points(route, base_interval_m);
        let frames = self.builder.build(&points, &self.urls);
        FrameManifest::from_frames(frames, points.len(), 0)
    }

    /// Frames for `route` with references from `resolver`; unresolved points are dropped.
    #[tracing::instrument(skip_all, fields(base_interval_m = base_interval_m))]
    pub async fn sample_route_with_resolver<R: ImageResolver>(
        &self,
        route: &Route,
        base_interval_m: f64,
        resolver: &R,
    ) -> FrameManifest {
        let points = self.sample_points(route, base_interval_m);
        let (frames, dropped) = self.builder.build_with_resolver(&points, resolver).await;
        FrameManifest::from_frames(frames, points.len(), dropped)
    }

    /// Frames for `route` with every image fetched into `cache`.
    ///
    /// Frames whose image could not be cached keep only the remote reference.
    pub async fn sample_route_with_cache<S, F, C>(
        &self,
        route: &Route,
        base_interval_m: f64,
        cache: &AssetCache<S, F, C>,
        on_progress: impl FnMut(CacheProgress),
    ) -> FrameManifest
    where
        S: CacheStorage,
        F: AssetFetcher,
        C: Clock,
    {
        let mut manifest = self.manifest(route, base_interval_m);
        cache_manifest(&mut manifest, cache, &CancellationToken::new(), on_progress).await;
        manifest
    }
}

/// Fetch every frame image of `manifest` into `cache` and mark the frames that made it.
pub async fn cache_manifest<S, F, C>(
    manifest: &mut FrameManifest,
    cache: &AssetCache<S, F, C>,
    cancel: &CancellationToken,
    on_progress: impl FnMut(CacheProgress),
) where
    S: CacheStorage,
    F: AssetFetcher,
    C: Clock,
{
    let handles = cache
        .fetch_batch_with_cancel(manifest.image_refs(), cancel, on_progress)
        .await;

    let mut cached = 0;
    for frame in &mut manifest.frames {
        match handles.get(&frame.image_ref) {
            Some(handle) => {
                frame.cached = true;
                frame.cached_ref = Some(handle.location.clone());
                cached += 1;
            }
            None => {
                frame.cached = false;
                frame.cached_ref = None;
            }
        }
    }
    manifest.stats.cached = cached;
    manifest.stats.cache_failed = manifest.frames.len() - cached;
    tracing::info!(cached, failed = manifest.stats.cache_failed, "frame images cached");
}

/// Route between two coordinates through `planner`, then build frames.
///
/// A routing failure is returned as is; every later failure only shortens the result.
pub async fn plan_frames<P: RoutingProvider>(
    planner: &RoutePlanner<P>,
    pipeline: &FramePipeline,
    start: Coordinate,
    end: Coordinate,
    base_interval_m: f64,
) -> RouteReelResult<FrameManifest> {
    let route = planner.plan(start, end).await?;
    Ok(pipeline.manifest(&route, base_interval_m))
}

/// Frames for `route` using default settings.
pub fn sample_route(route: &Route, base_interval_m: f64) -> Vec<Frame> {
    FramePipeline::default().sample_route(route, base_interval_m)
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
