use std::collections::HashSet;

use crate::{
    foundation::config::SamplerConfig,
    foundation::core::{Coordinate, Route},
    geo::geodesy::{distance_meters, initial_bearing_degrees},
    geo::turn::{TurnDirection, classify_direction, clean_instruction, is_maneuver},
};

/// Instruction attached to points approaching the end of the route.
pub const DESTINATION_INSTRUCTION: &str = "Continue straight to destination";

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
/// Where a [`TurnContext`] came from.
pub enum TurnContextKind {
    /// A maneuver step within the approach radius.
    Maneuver,
    /// Synthesized from proximity to the final step.
    Destination,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Turn annotation for a sampled point.
pub struct TurnContext {
    /// Maneuver or destination context.
    pub kind: TurnContextKind,
    /// Classified direction of the step.
    pub direction: TurnDirection,
    /// Cleaned instruction text.
    pub instruction: String,
    /// Index of the step in `Route::steps`.
    pub step_index: usize,
    /// Distance from the sampled point to the step location.
    pub distance_m: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// A location picked from the route polyline.
pub struct PathSample {
    /// Index into `Route::path`.
    pub path_index: usize,
    /// The polyline point itself.
    pub location: Coordinate,
}

#[derive(Clone, Debug, PartialEq)]
/// A sampled viewpoint with camera heading and optional turn context.
pub struct SampledPoint {
    /// Index into `Route::path`.
    pub path_index: usize,
    /// Viewpoint location.
    pub location: Coordinate,
    /// Camera heading toward the next sampled point; `0.0` for the last point.
    pub heading: f64,
    /// True when a maneuver lies within the approach radius.
    pub near_maneuver: bool,
    /// Nearest maneuver, or destination context.
    pub turn: Option<TurnContext>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Counters from one sampling run.
pub struct SampleStats {
    /// Points in the input polyline.
    pub path_points: usize,
    /// Points emitted after de-duplication.
    pub sampled: usize,
    /// Emitted points near a maneuver.
    pub near_maneuver: usize,
    /// Candidates dropped because their grid cell was already emitted.
    pub duplicates_skipped: usize,
}

#[derive(Clone, Debug)]
struct Maneuver {
    step_index: usize,
    location: Coordinate,
    instruction: String,
    direction: TurnDirection,
}

/// Adaptive-density route sampler.
///
/// Points are emitted every `base_interval_m` while the walk is within `approach_radius_m` of a
/// maneuver step and every `base_interval_m * sparse_factor` otherwise. The first and final path
/// points are always emitted.
#[derive(Clone, Debug, Default)]
pub struct RouteSampler {
    config: SamplerConfig,
}

impl RouteSampler {
    /// Sampler using `config`.
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample and annotate in one go.
    pub fn sample(&self, route: &Route) -> Vec<SampledPoint> {
        self.sample_with_stats(route).0
    }

    /// Sample and annotate, also returning counters.
    #[tracing::instrument(skip(self, route), fields(path_points = route.path.len(), steps = route.steps.len()))]
    pub fn sample_with_stats(&self, route: &Route) -> (Vec<SampledPoint>, SampleStats) {
        let (samples, duplicates_skipped) = self.sample_path_impl(route);
        let points = self.annotate(route, &samples);
        let stats = SampleStats {
            path_points: route.path.len(),
            sampled: points.len(),
            near_maneuver: points.iter().filter(|p| p.near_maneuver).count(),
            duplicates_skipped,
        };
        tracing::debug!(?stats, "sampled route");
        (points, stats)
    }

    /// Pick polyline points by adaptive density and de-duplicate them.
    ///
    /// A route without steps or without path points yields no samples.
    pub fn sample_path(&self, route: &Route) -> Vec<PathSample> {
        self.sample_path_impl(route).0
    }

    fn sample_path_impl(&self, route: &Route) -> (Vec<PathSample>, usize) {
        let path = &route.path;
        let Some(&first) = path.first() else {
            return (Vec::new(), 0);
        };
        if route.steps.is_empty() {
            return (Vec::new(), 0);
        }

        let maneuvers = maneuvers(route);
        let decimals = self.config.quantize_decimals;
        let dense = self.config.base_interval_m;
        let sparse = self.config.sparse_interval_m();

        let mut out = vec![PathSample {
            path_index: 0,
            location: first,
        }];
        let mut seen = HashSet::from([first.quantized_key(decimals)]);
        let mut skipped = 0usize;
        let mut accumulated = 0.0;

        let last_index = path.len() - 1;
        for i in 1..last_index {
            accumulated += distance_meters(path[i - 1], path[i]);
            let interval = if self.near_any(path[i], &maneuvers) {
                dense
            } else {
                sparse
            };
            if accumulated < interval {
                continue;
            }
            accumulated = 0.0;
            if seen.insert(path[i].quantized_key(decimals)) {
                out.push(PathSample {
                    path_index: i,
                    location: path[i],
                });
            } else {
                skipped += 1;
            }
        }

        if last_index > 0 {
            let last = PathSample {
                path_index: last_index,
                location: path[last_index],
            };
            let last_key = last.location.quantized_key(decimals);
            let prev_key = out
                .last()
                .map(|s| s.location.quantized_key(decimals))
                .unwrap_or(last_key);
            if last_key != prev_key {
                out.push(last);
            } else if out.len() > 1 {
                // Same cell as the previous sample: the endpoint takes its place.
                if let Some(prev) = out.last_mut() {
                    *prev = last;
                }
                skipped += 1;
            } else {
                skipped += 1;
            }
        }

        (out, skipped)
    }

    /// Attach heading and turn context to sampled locations.
    pub fn annotate(&self, route: &Route, samples: &[PathSample]) -> Vec<SampledPoint> {
        let maneuvers = maneuvers(route);
        samples
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let heading = samples
                    .get(i + 1)
                    .map(|next| initial_bearing_degrees(s.location, next.location))
                    .unwrap_or(0.0);
                let turn = self
                    .nearest_maneuver(s.location, &maneuvers)
                    .or_else(|| self.destination_context(route, s.location));
                let near_maneuver = turn
                    .as_ref()
                    .is_some_and(|t| t.kind == TurnContextKind::Maneuver);
                SampledPoint {
                    path_index: s.path_index,
                    location: s.location,
                    heading,
                    near_maneuver,
                    turn,
                }
            })
            .collect()
    }

    fn near_any(&self, at: Coordinate, maneuvers: &[Maneuver]) -> bool {
        maneuvers
            .iter()
            .any(|m| distance_meters(at, m.location) <= self.config.approach_radius_m)
    }

    fn nearest_maneuver(&self, at: Coordinate, maneuvers: &[Maneuver]) -> Option<TurnContext> {
        maneuvers
            .iter()
            .map(|m| (m, distance_meters(at, m.location)))
            .filter(|(_, d)| *d <= self.config.approach_radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(m, d)| TurnContext {
                kind: TurnContextKind::Maneuver,
                direction: m.direction,
                instruction: m.instruction.clone(),
                step_index: m.step_index,
                distance_m: d,
            })
    }

    fn destination_context(&self, route: &Route, at: Coordinate) -> Option<TurnContext> {
        let step_index = route.steps.len().checked_sub(1)?;
        let d = distance_meters(at, route.steps[step_index].location);
        (d <= self.config.destination_radius_m).then(|| TurnContext {
            kind: TurnContextKind::Destination,
            direction: TurnDirection::Straight,
            instruction: DESTINATION_INSTRUCTION.to_string(),
            step_index,
            distance_m: d,
        })
    }
}

fn maneuvers(route: &Route) -> Vec<Maneuver> {
    route
        .steps
        .iter()
        .enumerate()
        .map(|(step_index, s)| (step_index, s.location, clean_instruction(&s.instruction)))
        .filter(|(_, _, text)| is_maneuver(text))
        .map(|(step_index, location, instruction)| Maneuver {
            step_index,
            location,
            direction: classify_direction(&instruction),
            instruction,
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/sample/sampler.rs"]
mod tests;
