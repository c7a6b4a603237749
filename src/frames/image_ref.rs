use std::{fmt::Write as _, future::Future};

use crate::{
    foundation::config::{ImageServiceConfig, ImageSize},
    foundation::core::Coordinate,
    foundation::error::{RouteReelError, RouteReelResult},
    geo::geodesy::normalize_heading,
    routing::provider::RoutingProvider,
    sample::sampler::SampledPoint,
};

/// Deterministic URL builder for the street-level image service.
///
/// The same inputs always produce the same string, so references double as cache keys.
#[derive(Clone, Debug)]
pub struct ImageUrlBuilder {
    config: ImageServiceConfig,
}

impl ImageUrlBuilder {
    /// Validate `config` and build.
    ///
    /// Fails with [`RouteReelError::Uninitialized`] when a key is required but missing.
    pub fn new(config: ImageServiceConfig) -> RouteReelResult<Self> {
        config.validate()?;
        if config.require_key && config.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(RouteReelError::uninitialized(
                "image service requires an API key",
            ));
        }
        Ok(Self { config })
    }

    /// Builder over the default keyless endpoint.
    pub fn keyless() -> Self {
        Self {
            config: ImageServiceConfig::default(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ImageServiceConfig {
        &self.config
    }

    /// Reference for an arbitrary-point image.
    pub fn image_reference_for(
        &self,
        at: Coordinate,
        heading: f64,
        pitch: f64,
        fov_deg: f64,
        size: ImageSize,
    ) -> String {
        let mut url = self.prefix(size);
        let _ = write!(url, "&location={:.6},{:.6}", at.lat, at.lng);
        self.finish(url, heading, pitch, fov_deg)
    }

    /// Reference for a discrete panorama.
    pub fn panorama_reference_for(
        &self,
        panorama_id: &str,
        heading: f64,
        pitch: f64,
        fov_deg: f64,
        size: ImageSize,
    ) -> String {
        let mut url = self.prefix(size);
        let _ = write!(url, "&pano={}", encode_component(panorama_id));
        self.finish(url, heading, pitch, fov_deg)
    }

    /// Reference for a sampled point using configured pitch, field of view and size.
    pub fn reference_for_point(&self, point: &SampledPoint) -> String {
        self.image_reference_for(
            point.location,
            point.heading,
            self.config.pitch_deg,
            self.config.fov_deg,
            self.config.size,
        )
    }

    fn prefix(&self, size: ImageSize) -> String {
        let base = self.config.base_url.trim_end_matches(['?', '&']);
        let sep = if base.contains('?') { '&' } else { '?' };
        format!("{base}{sep}size={size}")
    }

    fn finish(&self, mut url: String, heading: f64, pitch: f64, fov_deg: f64) -> String {
        // Round before wrapping so 359.996 prints as 0.00, not 360.00.
        let heading = normalize_heading((heading * 100.0).round() / 100.0);
        let _ = write!(
            url,
            "&heading={heading:.2}&pitch={pitch:.2}&fov={fov_deg:.2}"
        );
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let _ = write!(url, "&key={}", encode_component(key));
        }
        url
    }
}

fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

/// Resolves the image reference for one sampled point.
///
/// Resolution may involve I/O; failures drop the point rather than aborting the pipeline.
pub trait ImageResolver {
    /// Reference for `point`, or an [`RouteReelError::ImageResolution`] error.
    fn resolve(&self, point: &SampledPoint) -> impl Future<Output = RouteReelResult<String>>;
}

/// Resolver backed directly by [`ImageUrlBuilder`]; never fails.
///
/// A missing required API key is rejected earlier, by [`ImageUrlBuilder::new`].
#[derive(Clone, Debug)]
pub struct UrlResolver {
    urls: ImageUrlBuilder,
}

impl UrlResolver {
    /// Wrap a URL builder.
    pub fn new(urls: ImageUrlBuilder) -> Self {
        Self { urls }
    }
}

impl ImageResolver for UrlResolver {
    async fn resolve(&self, point: &SampledPoint) -> RouteReelResult<String> {
        Ok(self.urls.reference_for_point(point))
    }
}

/// Resolver that snaps each point to the nearest provider panorama.
pub struct PanoramaResolver<'a, P> {
    provider: &'a P,
    urls: ImageUrlBuilder,
}

impl<'a, P: RoutingProvider> PanoramaResolver<'a, P> {
    /// Resolve through `provider`, searching `urls.config().panorama_radius_m`.
    pub fn new(provider: &'a P, urls: ImageUrlBuilder) -> Self {
        Self { provider, urls }
    }
}

impl<P: RoutingProvider> ImageResolver for PanoramaResolver<'_, P> {
    async fn resolve(&self, point: &SampledPoint) -> RouteReelResult<String> {
        let cfg = self.urls.config();
        let radius = cfg.panorama_radius_m;
        let panorama = self
            .provider
            .panorama_near(point.location, radius)
            .await
            .map_err(|e| RouteReelError::image_resolution(format!("panorama lookup: {e}")))?
            .ok_or_else(|| {
                RouteReelError::image_resolution(format!(
                    "no panorama within {radius} m of {}",
                    point.location
                ))
            })?;
        Ok(self.urls.panorama_reference_for(
            &panorama.id,
            point.heading,
            cfg.pitch_deg,
            cfg.fov_deg,
            cfg.size,
        ))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frames/image_ref.rs"]
mod tests;
