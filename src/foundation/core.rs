use std::{fs::File, io::BufReader, path::Path};

use crate::{
    foundation::error::{RouteReelError, RouteReelResult},
    geo::geodesy::distance_meters,
};

/// Tolerance used when checking that a route's path starts and ends at its declared endpoints.
const ENDPOINT_TOLERANCE_M: f64 = 10.0;

/// WGS-84 position in degrees.
///
/// Equality is exact field equality; adjacency between points is always judged by distance.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lng: f64,
}

impl Coordinate {
    /// Construct a coordinate without range checks.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the WGS-84 degree ranges.
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Grid key used for de-duplicating samples.
    ///
    /// Both components are scaled by `10^decimals` and rounded half away from zero, so two points
    /// collapse iff they fall in the same rounding cell. At 4 decimals a cell is ~11 m of latitude.
    pub fn quantized_key(self, decimals: u32) -> (i64, i64) {
        let scale = 10f64.powi(decimals as i32);
        ((self.lat * scale).round() as i64, (self.lng * scale).round() as i64)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

/// One routing-provider maneuver.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RouteStep {
    /// Where the maneuver happens.
    pub location: Coordinate,
    /// Free-text instruction, possibly containing HTML markup.
    pub instruction: String,
    /// Length of the step in meters.
    #[serde(default)]
    pub distance_m: f64,
    /// Expected duration of the step in seconds.
    #[serde(default)]
    pub duration_s: f64,
}

impl RouteStep {
    /// Build a step with zero distance and duration.
    pub fn new(location: Coordinate, instruction: impl Into<String>) -> Self {
        Self {
            location,
            instruction: instruction.into(),
            distance_m: 0.0,
            duration_s: 0.0,
        }
    }
}

/// A computed driving route: a high-resolution polyline plus coarse maneuver steps.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Route {
    /// Requested origin.
    pub start: Coordinate,
    /// Requested destination.
    pub end: Coordinate,
    /// Maneuvers ordered by progress along the route.
    #[serde(default)]
    pub steps: Vec<RouteStep>,
    /// Total route length reported by the provider.
    #[serde(default)]
    pub total_distance_m: f64,
    /// Total duration reported by the provider.
    #[serde(default)]
    pub total_duration_s: f64,
    /// Polyline including `start` and `end` as first/last points.
    pub path: Vec<Coordinate>,
}

impl Route {
    /// Build a route from a polyline and steps, deriving endpoints and totals.
    ///
    /// Returns a malformed-route error for an empty path.
    pub fn from_path_and_steps(
        path: Vec<Coordinate>,
        steps: Vec<RouteStep>,
    ) -> RouteReelResult<Self> {
        let (Some(&start), Some(&end)) = (path.first(), path.last()) else {
            return Err(RouteReelError::malformed_route("route path is empty"));
        };
        let total_duration_s = steps.iter().map(|s| s.duration_s).sum();
        let mut route = Self {
            start,
            end,
            steps,
            total_distance_m: 0.0,
            total_duration_s,
            path,
        };
        route.total_distance_m = route.path_length_m();
        Ok(route)
    }

    /// Parse a route from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> RouteReelResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| RouteReelError::serde(format!("parse route JSON: {e}")))
    }

    /// Parse a route from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> RouteReelResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            RouteReelError::validation(format!("open route JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Great-circle length of the polyline.
    pub fn path_length_m(&self) -> f64 {
        self.path
            .windows(2)
            .map(|w| distance_meters(w[0], w[1]))
            .sum()
    }

    /// Structural checks on the route.
    ///
    /// The sampler does not require a valid route; this is for callers that want to reject bad
    /// provider output up front.
    pub fn validate(&self) -> RouteReelResult<()> {
        let (Some(&first), Some(&last)) = (self.path.first(), self.path.last()) else {
            return Err(RouteReelError::malformed_route("route path is empty"));
        };
        if let Some(i) = self.path.iter().position(|c| !c.is_valid()) {
            return Err(RouteReelError::malformed_route(format!(
                "path point {i} is not a valid coordinate"
            )));
        }
        if distance_meters(first, self.start) > ENDPOINT_TOLERANCE_M {
            return Err(RouteReelError::malformed_route(
                "path does not begin at route start",
            ));
        }
        if distance_meters(last, self.end) > ENDPOINT_TOLERANCE_M {
            return Err(RouteReelError::malformed_route(
                "path does not finish at route end",
            ));
        }

        let mut prev_index = 0usize;
        for (step_index, step) in self.steps.iter().enumerate() {
            if !step.location.is_valid() {
                return Err(RouteReelError::malformed_route(format!(
                    "step {step_index} location is not a valid coordinate"
                )));
            }
            let idx = nearest_path_index(&self.path, step.location);
            if idx < prev_index {
                return Err(RouteReelError::malformed_route(format!(
                    "step {step_index} lies before the previous step along the path"
                )));
            }
            prev_index = idx;
        }
        Ok(())
    }
}

fn nearest_path_index(path: &[Coordinate], target: Coordinate) -> usize {
    path.iter()
        .enumerate()
        .map(|(i, &c)| (i, distance_meters(c, target)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
