use super::*;
use crate::routing::provider::{Panorama, StaticRouteProvider};

fn builder(key: Option<&str>) -> ImageUrlBuilder {
    ImageUrlBuilder::new(ImageServiceConfig {
        base_url: "https://img.example/streetview".to_string(),
        api_key: key.map(str::to_string),
        ..ImageServiceConfig::default()
    })
    .unwrap()
}

fn point(lat: f64, lng: f64, heading: f64) -> SampledPoint {
    SampledPoint {
        path_index: 0,
        location: Coordinate::new(lat, lng),
        heading,
        near_maneuver: false,
        turn: None,
    }
}

#[test]
fn reference_is_deterministic_and_formatted() {
    let b = builder(Some("k/1"));
    let url = b.image_reference_for(
        Coordinate::new(40.7128, -74.006),
        93.456,
        5.0,
        90.0,
        ImageSize {
            width: 640,
            height: 480,
        },
    );
    assert_eq!(
        url,
        "https://img.example/streetview?size=640x480&location=40.712800,-74.006000&heading=93.46&pitch=5.00&fov=90.00&key=k%2F1"
    );
    assert_eq!(
        url,
        b.image_reference_for(
            Coordinate::new(40.7128, -74.006),
            93.456,
            5.0,
            90.0,
            ImageSize {
                width: 640,
                height: 480
            },
        )
    );
}

#[test]
fn base_url_with_query_appends_with_ampersand() {
    let b = ImageUrlBuilder::new(ImageServiceConfig {
        base_url: "https://img.example/sv?source=outdoor".to_string(),
        ..ImageServiceConfig::default()
    })
    .unwrap();
    let url = b.reference_for_point(&point(1.0, 2.0, 0.0));
    assert!(url.starts_with("https://img.example/sv?source=outdoor&size=640x640&location="));
    assert!(!url.contains("key="));
}

#[test]
fn missing_required_key_is_uninitialized() {
    let err = ImageUrlBuilder::new(ImageServiceConfig {
        require_key: true,
        ..ImageServiceConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, RouteReelError::Uninitialized(_)));
}

#[tokio::test]
async fn url_resolver_uses_point_heading() {
    let r = UrlResolver::new(builder(None));
    let url = r.resolve(&point(0.0, 0.0, 270.0)).await.unwrap();
    assert!(url.contains("&heading=270.00&"));
}

#[test]
fn heading_near_full_turn_wraps_to_zero() {
    let b = builder(None);
    let size = b.config().size;
    let at = Coordinate::new(0.0, 0.0);
    for h in [359.996, 359.9999, -0.001, -0.0] {
        let url = b.image_reference_for(at, h, 0.0, 90.0, size);
        assert!(url.contains("&heading=0.00&"), "{h}: {url}");
    }
    let url = b.image_reference_for(at, 359.994, 0.0, 90.0, size);
    assert!(url.contains("&heading=359.99&"), "{url}");
}

#[tokio::test]
async fn panorama_resolver_snaps_or_fails() {
    let provider = StaticRouteProvider::new().with_panorama(Panorama {
        id: "pano 7".to_string(),
        location: Coordinate::new(0.0, 0.0001),
    });
    let r = PanoramaResolver::new(&provider, builder(None));

    let url = r.resolve(&point(0.0, 0.0, 45.0)).await.unwrap();
    assert!(url.contains("&pano=pano%207&heading=45.00"));
    assert!(!url.contains("location="));

    let err = r.resolve(&point(5.0, 5.0, 45.0)).await.unwrap_err();
    assert!(matches!(err, RouteReelError::ImageResolution(_)));
}
