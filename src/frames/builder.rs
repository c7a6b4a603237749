use crate::{
    foundation::core::Coordinate,
    frames::image_ref::{ImageResolver, ImageUrlBuilder},
    geo::turn::TurnDirection,
    sample::sampler::{SampledPoint, TurnContextKind},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// One playable viewpoint along the route.
pub struct Frame {
    /// Camera location.
    pub location: Coordinate,
    /// Camera heading in `[0, 360)`; `0.0` on the last frame.
    pub heading: f64,
    /// Camera pitch in degrees.
    pub pitch: f64,
    /// Remote image reference (URL).
    pub image_ref: String,
    /// Position among emitted frames; contiguous from 0.
    pub sequence_index: usize,
    /// Position in the sampled-point sequence this frame came from.
    pub source_index: usize,
    /// True when a maneuver lies within the approach radius.
    pub is_near_turn: bool,
    /// Direction of the attached maneuver or destination context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_direction: Option<TurnDirection>,
    /// Instruction of the attached maneuver or destination context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_instruction: Option<String>,
    /// Image bytes are available in the local asset cache.
    #[serde(default)]
    pub cached: bool,
    /// Local cache handle when `cached` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_ref: Option<String>,
}

/// Maps sampled points to [`Frame`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameBuilder {
    pitch: f64,
}

impl FrameBuilder {
    /// Builder stamping `pitch` on every frame.
    pub fn new(pitch: f64) -> Self {
        Self { pitch }
    }

    /// Build frames with URLs from a pure builder. Every point becomes a frame.
    pub fn build(&self, points: &[SampledPoint], urls: &ImageUrlBuilder) -> Vec<Frame> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| self.frame(p, urls.reference_for_point(p), i, i))
            .collect()
    }

    /// Build frames through an asynchronous resolver.
    ///
    /// Points are resolved one at a time in route order. A point whose reference cannot be
    /// resolved is dropped and logged; the returned count is the number of dropped points.
    pub async fn build_with_resolver<R: ImageResolver>(
        &self,
        points: &[SampledPoint],
        resolver: &R,
    ) -> (Vec<Frame>, usize) {
        let mut frames = Vec::with_capacity(points.len());
        let mut dropped = 0usize;
        for (source_index, p) in points.iter().enumerate() {
            match resolver.resolve(p).await {
                Ok(image_ref) => {
                    let seq = frames.len();
                    frames.push(self.frame(p, image_ref, seq, source_index));
                }
                Err(e) => {
                    dropped += 1;
                    tracing::warn!(source_index, location = %p.location, error = %e, "dropping frame");
                }
            }
        }
        if dropped > 0 {
            tracing::info!(dropped, emitted = frames.len(), "some frames had no image");
        }
        (frames, dropped)
    }

    fn frame(
        &self,
        p: &SampledPoint,
        image_ref: String,
        sequence_index: usize,
        source_index: usize,
    ) -> Frame {
        Frame {
            location: p.location,
            heading: p.heading,
            pitch: self.pitch,
            image_ref,
            sequence_index,
            source_index,
            is_near_turn: p
                .turn
                .as_ref()
                .is_some_and(|t| t.kind == TurnContextKind::Maneuver),
            turn_direction: p.turn.as_ref().map(|t| t.direction),
            turn_instruction: p.turn.as_ref().map(|t| t.instruction.clone()),
            cached: false,
            cached_ref: None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frames/builder.rs"]
mod tests;
