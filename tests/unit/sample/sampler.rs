use super::*;
use crate::foundation::core::RouteStep;
use crate::geo::geodesy::EARTH_RADIUS_M;

fn meters_to_lng_deg(m: f64) -> f64 {
    (m / EARTH_RADIUS_M).to_degrees()
}

/// Straight eastbound polyline along the equator with `n + 1` points `step_m` apart.
fn equator_path(n: usize, step_m: f64) -> Vec<Coordinate> {
    let step = meters_to_lng_deg(step_m);
    (0..=n).map(|i| Coordinate::new(0.0, i as f64 * step)).collect()
}

fn route(path: Vec<Coordinate>, steps: Vec<RouteStep>) -> Route {
    Route::from_path_and_steps(path, steps).unwrap()
}

fn head_east(at: Coordinate) -> RouteStep {
    RouteStep::new(at, "Head east on Equator Rd")
}

fn sampler(base: f64, sparse: f64, approach: f64) -> RouteSampler {
    RouteSampler::new(SamplerConfig {
        base_interval_m: base,
        sparse_factor: sparse,
        approach_radius_m: approach,
        ..SamplerConfig::default()
    })
}

#[test]
fn short_route_without_maneuvers_emits_only_endpoints() {
    let path = vec![
        Coordinate::new(0.0, 0.0),
        Coordinate::new(0.0, 0.001),
        Coordinate::new(0.0, 0.002),
    ];
    let r = route(path.clone(), vec![head_east(path[0])]);
    let samples = sampler(100.0, 5.0, 50.0).sample_path(&r);
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].location, path[0]);
    assert_eq!(samples[1].location, path[2]);
}

#[test]
fn empty_path_or_no_steps_yields_nothing() {
    let s = RouteSampler::default();

    let mut empty = route(equator_path(3, 10.0), vec![head_east(Coordinate::new(0.0, 0.0))]);
    empty.path.clear();
    assert!(s.sample(&empty).is_empty());

    let no_steps = route(equator_path(3, 10.0), vec![]);
    assert!(s.sample(&no_steps).is_empty());
}

#[test]
fn coincident_endpoints_collapse_to_one_sample() {
    let a = Coordinate::new(10.0, 10.0);
    let b = Coordinate::new(10.00001, 10.00001);
    let r = route(vec![a, b], vec![head_east(a)]);
    let samples = RouteSampler::default().sample_path(&r);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].location, a);
}

#[test]
fn first_and_last_samples_match_path_endpoints() {
    let path = equator_path(400, 7.3);
    let steps = vec![
        head_east(path[0]),
        RouteStep::new(path[150], "Turn left onto Main St"),
        RouteStep::new(path[320], "Take the ramp onto I-90"),
    ];
    let r = route(path.clone(), steps);
    let samples = RouteSampler::default().sample_path(&r);
    assert_eq!(samples.first().unwrap().location, path[0]);
    assert_eq!(samples.last().unwrap().location, path[400]);
}

#[test]
fn consecutive_samples_are_distinct_cells() {
    // 2 m spacing is far below the ~11 m grid, so many candidates hit occupied cells.
    let path = equator_path(500, 2.0);
    let steps = vec![
        head_east(path[0]),
        RouteStep::new(path[250], "Turn right onto Elm Ave"),
    ];
    let r = route(path, steps);
    let (points, stats) = sampler(5.0, 5.0, 100.0).sample_with_stats(&r);
    assert!(stats.duplicates_skipped > 0);
    for w in points.windows(2) {
        assert!(distance_meters(w[0].location, w[1].location) > 0.0);
        assert_ne!(w[0].location.quantized_key(4), w[1].location.quantized_key(4));
    }
}

#[test]
fn quantization_boundary_policy() {
    // (0, 0.00004) rounds into the origin's cell 4.4 m away; (0, 0.00006) is only 2.2 m from
    // it but rounds into the next cell, so it survives.
    let path = vec![
        Coordinate::new(0.0, 0.0),
        Coordinate::new(0.0, 0.00004),
        Coordinate::new(0.0, 0.00006),
        Coordinate::new(0.0, 0.0002),
    ];
    let r = route(path, vec![head_east(Coordinate::new(0.0, 0.0))]);
    let samples = sampler(1.0, 1.0, 0.0).sample_path(&r);
    let indices: Vec<usize> = samples.iter().map(|s| s.path_index).collect();
    assert_eq!(indices, vec![0, 2, 3]);
}

#[test]
fn final_point_replaces_previous_sample_in_same_cell() {
    let path = vec![
        Coordinate::new(0.0, 0.0),
        Coordinate::new(0.0, 0.001),
        Coordinate::new(0.0, 0.00102),
    ];
    let r = route(path.clone(), vec![head_east(path[0])]);
    let samples = sampler(1.0, 1.0, 0.0).sample_path(&r);
    let indices: Vec<usize> = samples.iter().map(|s| s.path_index).collect();
    assert_eq!(indices, vec![0, 2]);
}

#[test]
fn straight_route_density_follows_sparse_interval() {
    let step_m = 5.001;
    let path = equator_path(1000, step_m);
    let length = 1000.0 * step_m;
    let r = route(path.clone(), vec![head_east(path[0])]);
    let s = sampler(20.0, 5.0, 50.0);
    let samples = s.sample_path(&r);
    let expected = length / s.config().sparse_interval_m();
    assert!(
        (samples.len() as f64 - expected).abs() <= 2.0,
        "{} samples, expected ~{expected}",
        samples.len()
    );
}

#[test]
fn density_near_maneuver_exceeds_sparse_density_by_ratio() {
    let step_m = 5.001;
    let path = equator_path(2000, step_m);
    let turn_at = path[1000];
    let steps = vec![
        head_east(path[0]),
        RouteStep::new(turn_at, "Turn left onto Main St"),
    ];
    let r = route(path, steps);
    let s = sampler(20.0, 5.0, 200.0);
    let samples = s.sample_path(&r);

    let inside = |c: Coordinate| distance_meters(c, turn_at) <= 200.0;
    let body = &samples[..samples.len() - 1];
    let (mut in_sum, mut in_n, mut out_sum, mut out_n) = (0.0, 0, 0.0, 0);
    for w in body.windows(2) {
        let d = distance_meters(w[0].location, w[1].location);
        match (inside(w[0].location), inside(w[1].location)) {
            (true, true) => {
                in_sum += d;
                in_n += 1;
            }
            (false, false) => {
                out_sum += d;
                out_n += 1;
            }
            _ => {}
        }
    }
    assert!(in_n > 5 && out_n > 5);
    let dense_spacing = in_sum / f64::from(in_n);
    let sparse_spacing = out_sum / f64::from(out_n);
    let ratio = sparse_spacing / dense_spacing;
    assert!(ratio >= s.config().sparse_factor - 1e-6, "ratio {ratio}");
}

#[test]
fn annotate_assigns_headings_and_last_heading_zero() {
    let path = vec![
        Coordinate::new(0.0, 0.0),
        Coordinate::new(0.0, 0.002),
        Coordinate::new(0.002, 0.002),
    ];
    let r = route(path.clone(), vec![head_east(path[0])]);
    let samples = [
        PathSample {
            path_index: 0,
            location: path[0],
        },
        PathSample {
            path_index: 1,
            location: path[1],
        },
        PathSample {
            path_index: 2,
            location: path[2],
        },
    ];
    let points = RouteSampler::default().annotate(&r, &samples);
    assert!((points[0].heading - 90.0).abs() < 1e-6);
    assert!(points[1].heading.abs() < 1e-6);
    assert_eq!(points[2].heading, 0.0);
}

#[test]
fn nearest_maneuver_wins_and_destination_context_fills_in() {
    let path = equator_path(100, 10.0);
    let steps = vec![
        head_east(path[0]),
        RouteStep::new(path[40], "Turn <b>left</b> onto Main St"),
        RouteStep::new(path[44], "Turn right onto Elm Ave"),
        RouteStep::new(path[100], "Arrive at destination"),
    ];
    let r = route(path.clone(), steps);
    let s = RouteSampler::new(SamplerConfig {
        approach_radius_m: 50.0,
        destination_radius_m: 120.0,
        ..SamplerConfig::default()
    });
    let at = |i: usize| PathSample {
        path_index: i,
        location: path[i],
    };
    let points = s.annotate(&r, &[at(39), at(45), at(70), at(92)]);

    let t = points[0].turn.as_ref().unwrap();
    assert_eq!(t.kind, TurnContextKind::Maneuver);
    assert_eq!(t.direction, TurnDirection::Left);
    assert_eq!(t.instruction, "Turn left onto Main St");
    assert_eq!(t.step_index, 1);
    assert!(points[0].near_maneuver);

    let t = points[1].turn.as_ref().unwrap();
    assert_eq!(t.direction, TurnDirection::Right);
    assert_eq!(t.step_index, 2);

    assert!(points[2].turn.is_none());
    assert!(!points[2].near_maneuver);

    let t = points[3].turn.as_ref().unwrap();
    assert_eq!(t.kind, TurnContextKind::Destination);
    assert_eq!(t.direction, TurnDirection::Straight);
    assert_eq!(t.instruction, DESTINATION_INSTRUCTION);
    assert!(!points[3].near_maneuver);
}
