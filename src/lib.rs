//! RouteReel turns a driving route into a playable sequence of street-level frames.
//!
//! The pipeline is synchronous at its core and asynchronous at its edges:
//!
//! - Sample a [`Route`] polyline with a [`RouteSampler`], dense near maneuvers and sparse on
//!   straight stretches
//! - Turn the samples into [`Frame`]s with headings, turn annotations and image references
//! - Optionally pull every image into a size- and age-bounded [`AssetCache`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// URL-keyed local asset cache.
pub mod assets;
/// Frames and image references.
pub mod frames;
/// Geodesy and turn heuristics.
pub mod geo;
/// End-to-end route → frame pipeline.
pub mod pipeline;
/// Routing collaborator contract.
pub mod routing;
/// Adaptive route sampling.
pub mod sample;

pub use crate::foundation::config::{
    CacheConfig, DEFAULT_IMAGE_BASE_URL, ImageServiceConfig, ImageSize, RetryPolicy,
    SamplerConfig, Settings,
};
pub use crate::foundation::core::{Coordinate, Route, RouteStep};
pub use crate::foundation::error::{RouteReelError, RouteReelResult};
pub use crate::foundation::retry::retry_with_backoff;
pub use crate::foundation::service::ServiceHandle;

pub use crate::assets::cache::{AssetCache, AssetHandle, CacheProgress, CacheStats, Clock, SystemClock};
pub use crate::assets::fetch::{AssetFetcher, HttpFetcher};
pub use crate::assets::storage::{CacheStorage, DiskStorage, EntryMeta, MemoryStorage};
pub use crate::frames::builder::{Frame, FrameBuilder};
pub use crate::frames::image_ref::{ImageResolver, ImageUrlBuilder, PanoramaResolver, UrlResolver};
pub use crate::geo::turn::TurnDirection;
pub use crate::pipeline::{
    FrameManifest, FramePipeline, ManifestStats, cache_manifest, plan_frames, sample_route,
};
pub use crate::routing::provider::{Panorama, RoutePlanner, RoutingProvider, StaticRouteProvider};
pub use crate::sample::sampler::{RouteSampler, SampleStats, SampledPoint, TurnContext};
