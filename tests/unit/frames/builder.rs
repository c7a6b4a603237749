use std::cell::RefCell;

use super::*;
use crate::foundation::config::ImageServiceConfig;
use crate::foundation::error::{RouteReelError, RouteReelResult};
use crate::sample::sampler::TurnContext;

fn points(n: usize) -> Vec<SampledPoint> {
    (0..n)
        .map(|i| SampledPoint {
            path_index: i * 10,
            location: Coordinate::new(0.0, i as f64 * 0.001),
            heading: if i + 1 < n { 90.0 } else { 0.0 },
            near_maneuver: i == 1,
            turn: (i == 1).then(|| TurnContext {
                kind: TurnContextKind::Maneuver,
                direction: TurnDirection::Left,
                instruction: "Turn left onto Main St".to_string(),
                step_index: 1,
                distance_m: 3.0,
            }),
        })
        .collect()
}

/// Fails on every source index in `fail`, recording call order.
struct FlakyResolver {
    fail: Vec<usize>,
    calls: RefCell<Vec<usize>>,
}

impl ImageResolver for FlakyResolver {
    async fn resolve(&self, point: &SampledPoint) -> RouteReelResult<String> {
        let idx = point.path_index / 10;
        self.calls.borrow_mut().push(idx);
        tokio::task::yield_now().await;
        if self.fail.contains(&idx) {
            Err(RouteReelError::image_resolution("service said no"))
        } else {
            Ok(format!("img://{idx}"))
        }
    }
}

#[test]
fn build_maps_every_point_with_turn_metadata() {
    let urls = ImageUrlBuilder::new(ImageServiceConfig::default()).unwrap();
    let frames = FrameBuilder::new(10.0).build(&points(3), &urls);

    assert_eq!(frames.len(), 3);
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(f.sequence_index, i);
        assert_eq!(f.pitch, 10.0);
        assert!(!f.cached);
    }
    assert!(frames[1].is_near_turn);
    assert_eq!(frames[1].turn_direction, Some(TurnDirection::Left));
    assert_eq!(
        frames[1].turn_instruction.as_deref(),
        Some("Turn left onto Main St")
    );
    assert!(!frames[0].is_near_turn);
    assert_eq!(frames[2].heading, 0.0);
}

#[tokio::test]
async fn failed_resolutions_are_skipped_in_order() {
    let resolver = FlakyResolver {
        fail: vec![1, 3],
        calls: RefCell::new(Vec::new()),
    };
    let (frames, dropped) = FrameBuilder::default()
        .build_with_resolver(&points(5), &resolver)
        .await;

    assert_eq!(dropped, 2);
    assert_eq!(*resolver.calls.borrow(), vec![0, 1, 2, 3, 4]);
    let seq: Vec<usize> = frames.iter().map(|f| f.sequence_index).collect();
    let src: Vec<usize> = frames.iter().map(|f| f.source_index).collect();
    assert_eq!(seq, vec![0, 1, 2]);
    assert_eq!(src, vec![0, 2, 4]);
    assert_eq!(frames[2].image_ref, "img://4");
}

#[test]
fn destination_context_is_not_a_turn() {
    let mut pts = points(1);
    pts[0].turn = Some(TurnContext {
        kind: TurnContextKind::Destination,
        direction: TurnDirection::Straight,
        instruction: "Continue straight to destination".to_string(),
        step_index: 4,
        distance_m: 80.0,
    });
    let urls = ImageUrlBuilder::new(ImageServiceConfig::default()).unwrap();
    let frames = FrameBuilder::default().build(&pts, &urls);
    assert!(!frames[0].is_near_turn);
    assert_eq!(frames[0].turn_direction, Some(TurnDirection::Straight));
}
