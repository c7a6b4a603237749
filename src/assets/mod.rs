//! URL-keyed local asset cache.

/// Size- and age-bounded cache with batched fetch.
pub mod cache;
/// Network fetchers.
pub mod fetch;
/// Persistent key → payload tables.
pub mod storage;
