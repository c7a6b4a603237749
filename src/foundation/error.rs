/// Convenience result type used across routereel.
pub type RouteReelResult<T> = Result<T, RouteReelError>;

/// Top-level error taxonomy used by pipeline and cache APIs.
///
/// Only [`RouteReelError::Routing`] is fatal to the frame pipeline. Image resolution, fetch and
/// cache storage failures are absorbed by the stage that hits them and only surface here when a
/// lower-level API is called directly.
#[derive(thiserror::Error, Debug)]
pub enum RouteReelError {
    /// The routing collaborator could not produce a route.
    #[error("routing error: {0}")]
    Routing(String),

    /// A sampled point could not be given an image reference.
    #[error("image resolution error: {0}")]
    ImageResolution(String),

    /// Network fetch of an asset failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Persistent cache store could not be opened, read or written.
    #[error("cache storage error: {0}")]
    CacheStorage(String),

    /// Route data is structurally inconsistent.
    #[error("malformed route: {0}")]
    MalformedRoute(String),

    /// Invalid user-provided configuration or argument values.
    #[error("validation error: {0}")]
    Validation(String),

    /// A service handle was used before initialization.
    #[error("uninitialized: {0}")]
    Uninitialized(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RouteReelError {
    /// Build a [`RouteReelError::Routing`] value.
    pub fn routing(msg: impl Into<String>) -> Self {
        Self::Routing(msg.into())
    }

    /// Build a [`RouteReelError::ImageResolution`] value.
    pub fn image_resolution(msg: impl Into<String>) -> Self {
        Self::ImageResolution(msg.into())
    }

    /// Build a [`RouteReelError::Fetch`] value.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Build a [`RouteReelError::CacheStorage`] value.
    pub fn cache_storage(msg: impl Into<String>) -> Self {
        Self::CacheStorage(msg.into())
    }

    /// Build a [`RouteReelError::MalformedRoute`] value.
    pub fn malformed_route(msg: impl Into<String>) -> Self {
        Self::MalformedRoute(msg.into())
    }

    /// Build a [`RouteReelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`RouteReelError::Uninitialized`] value.
    pub fn uninitialized(msg: impl Into<String>) -> Self {
        Self::Uninitialized(msg.into())
    }

    /// Build a [`RouteReelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Whether this error aborts the whole frame pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Routing(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
