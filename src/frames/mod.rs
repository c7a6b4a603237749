//! Sampled points to playable frames.

/// Frame type and builder.
pub mod builder;
/// Image reference construction and resolution.
pub mod image_ref;
