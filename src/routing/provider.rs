use std::future::Future;

use crate::{
    foundation::core::{Coordinate, Route},
    foundation::error::{RouteReelError, RouteReelResult},
    foundation::service::ServiceHandle,
    geo::geodesy::distance_meters,
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A discrete street-level imagery location known to the provider.
pub struct Panorama {
    /// Provider-specific panorama id.
    pub id: String,
    /// Where the panorama was actually captured.
    pub location: Coordinate,
}

/// Routing and imagery-lookup collaborator.
///
/// Implementations talk to an external provider; the pipeline treats them as black boxes.
pub trait RoutingProvider {
    /// Compute a driving route; failures are [`RouteReelError::Routing`].
    fn compute_route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> impl Future<Output = RouteReelResult<Route>>;

    /// Nearest panorama within `radius_m` of `at`, for providers with discrete imagery.
    fn panorama_near(
        &self,
        at: Coordinate,
        radius_m: f64,
    ) -> impl Future<Output = RouteReelResult<Option<Panorama>>> {
        let _ = (at, radius_m);
        async { Ok(None) }
    }
}

/// Serves pre-computed routes, e.g. ones saved as JSON.
///
/// A request matches a stored route when both endpoints are within `tolerance_m`.
#[derive(Clone, Debug, Default)]
pub struct StaticRouteProvider {
    routes: Vec<Route>,
    panoramas: Vec<Panorama>,
    tolerance_m: f64,
}

impl StaticRouteProvider {
    /// Provider with no routes and a 25 m endpoint tolerance.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            panoramas: Vec::new(),
            tolerance_m: 25.0,
        }
    }

    /// Add a route.
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Add a known panorama.
    pub fn with_panorama(mut self, panorama: Panorama) -> Self {
        self.panoramas.push(panorama);
        self
    }

    /// Override the endpoint match tolerance.
    pub fn with_tolerance(mut self, tolerance_m: f64) -> Self {
        self.tolerance_m = tolerance_m;
        self
    }
}

impl RoutingProvider for StaticRouteProvider {
    async fn compute_route(&self, start: Coordinate, end: Coordinate) -> RouteReelResult<Route> {
        if !start.is_valid() || !end.is_valid() {
            return Err(RouteReelError::routing(format!(
                "invalid endpoints {start} -> {end}"
            )));
        }
        self.routes
            .iter()
            .find(|r| {
                distance_meters(r.start, start) <= self.tolerance_m
                    && distance_meters(r.end, end) <= self.tolerance_m
            })
            .cloned()
            .ok_or_else(|| RouteReelError::routing(format!("no route found {start} -> {end}")))
    }

    async fn panorama_near(
        &self,
        at: Coordinate,
        radius_m: f64,
    ) -> RouteReelResult<Option<Panorama>> {
        Ok(self
            .panoramas
            .iter()
            .map(|p| (p, distance_meters(p.location, at)))
            .filter(|(_, d)| *d <= radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p.clone()))
    }
}

/// Owns the routing client and its lifecycle.
#[derive(Debug)]
pub struct RoutePlanner<P> {
    provider: ServiceHandle<P>,
}

impl<P> Default for RoutePlanner<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> RoutePlanner<P> {
    const SERVICE: &'static str = "routing provider";

    /// Planner without a provider; calls fail until [`RoutePlanner::init`].
    pub fn new() -> Self {
        Self {
            provider: ServiceHandle::uninitialized(Self::SERVICE),
        }
    }

    /// Install the provider.
    pub fn init(&mut self, provider: P) {
        self.provider.init(provider);
    }

    /// Drop the provider.
    pub fn teardown(&mut self) -> Option<P> {
        self.provider.teardown(Self::SERVICE)
    }

    /// Borrow the provider.
    pub fn provider(&self) -> RouteReelResult<&P> {
        self.provider.get()
    }
}

impl<P: RoutingProvider> RoutePlanner<P> {
    /// Compute a route through the installed provider.
    #[tracing::instrument(skip(self))]
    pub async fn plan(&self, start: Coordinate, end: Coordinate) -> RouteReelResult<Route> {
        let provider = self.provider.get()?;
        let route = provider.compute_route(start, end).await?;
        tracing::info!(
            path_points = route.path.len(),
            steps = route.steps.len(),
            distance_m = route.total_distance_m,
            "route computed"
        );
        Ok(route)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/routing/provider.rs"]
mod tests;
