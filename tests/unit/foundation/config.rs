use std::collections::HashMap;

use super::*;

#[test]
fn empty_document_yields_defaults() {
    let s = Settings::from_reader("{}".as_bytes()).unwrap();
    assert_eq!(s, Settings::default());
    s.validate().unwrap();
    assert_eq!(s.sampler.sparse_interval_m(), 100.0);
    assert_eq!(s.cache.batch_size, 5);
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let json = r#"{"sampler": {"base_interval_m": 15.0}, "cache": {"max_bytes": 1024}}"#;
    let s = Settings::from_reader(json.as_bytes()).unwrap();
    assert_eq!(s.sampler.base_interval_m, 15.0);
    assert_eq!(s.sampler.sparse_factor, 5.0);
    assert_eq!(s.cache.max_bytes, 1024);
    assert_eq!(s.cache.evict_target_bytes(), 819);
}

#[test]
fn env_overrides_apply_and_reject_garbage() {
    let env: HashMap<&str, &str> = [
        ("ROUTEREEL_CACHE_DIR", "/tmp/reel"),
        ("ROUTEREEL_IMAGE_KEY", "abc123"),
        ("ROUTEREEL_BATCH_SIZE", " 8 "),
    ]
    .into_iter()
    .collect();
    let mut s = Settings::default();
    s.apply_env_with(|k| env.get(k).map(|v| v.to_string()))
        .unwrap();
    assert_eq!(s.cache.dir, Some(PathBuf::from("/tmp/reel")));
    assert_eq!(s.image.api_key.as_deref(), Some("abc123"));
    assert_eq!(s.cache.batch_size, 8);

    let err = s
        .apply_env_with(|k| (k == "ROUTEREEL_CACHE_MAX_BYTES").then(|| "lots".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("ROUTEREEL_CACHE_MAX_BYTES"));
}

#[test]
fn validation_catches_bad_ranges() {
    let mut s = Settings::default();
    s.sampler.base_interval_m = 0.0;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.sampler.sparse_factor = 0.5;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.cache.batch_size = 0;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.image.fov_deg = 180.0;
    assert!(s.validate().is_err());
}

#[test]
fn retry_backoff_doubles_and_caps() {
    let p = RetryPolicy {
        max_attempts: 5,
        initial_backoff_ms: 100,
        max_backoff_ms: 350,
    };
    assert_eq!(p.backoff_for(1), Duration::from_millis(100));
    assert_eq!(p.backoff_for(2), Duration::from_millis(200));
    assert_eq!(p.backoff_for(3), Duration::from_millis(350));
    assert_eq!(RetryPolicy::none().backoff_for(1), Duration::ZERO);
}

#[test]
fn explicit_cache_dir_wins() {
    let cfg = CacheConfig {
        dir: Some(PathBuf::from("somewhere")),
        ..CacheConfig::default()
    };
    assert_eq!(cfg.resolve_dir().unwrap(), PathBuf::from("somewhere"));
}
