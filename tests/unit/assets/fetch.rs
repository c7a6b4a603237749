use super::*;

#[test]
fn status_classification() {
    assert!(classify_status(StatusCode::OK).is_none());
    assert!(matches!(
        classify_status(StatusCode::SERVICE_UNAVAILABLE),
        Some(FetchFailure::Transient(_))
    ));
    assert!(matches!(
        classify_status(StatusCode::TOO_MANY_REQUESTS),
        Some(FetchFailure::Transient(_))
    ));
    assert!(matches!(
        classify_status(StatusCode::NOT_FOUND),
        Some(FetchFailure::Permanent(_))
    ));
    assert!(matches!(
        classify_status(StatusCode::FORBIDDEN),
        Some(FetchFailure::Permanent(_))
    ));
}

#[test]
fn failure_display_is_the_message() {
    assert_eq!(FetchFailure::Transient("HTTP 503".into()).to_string(), "HTTP 503");
}

#[tokio::test]
async fn invalid_url_is_a_fetch_error() {
    let fetcher = HttpFetcher::new(&CacheConfig {
        retry: RetryPolicy::none(),
        ..CacheConfig::default()
    })
    .unwrap();
    let err = fetcher.fetch("not a url").await.unwrap_err();
    assert!(matches!(err, RouteReelError::Fetch(_)));
    assert!(err.to_string().contains("not a url"));
}
