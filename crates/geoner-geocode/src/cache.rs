//! Lookup cache for geocoders
//!
//! Documents name the same places over and over; this decorator keeps
//! the answer for each normalised address, including "no candidate"
//! answers. Errors are never cached.
//!
//! Uses the moka crate for an async-compatible bounded cache.
//!
//! Author: hephaex@gmail.com

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use geoner_core::{GeoPoint, Geocoder, Result};
use moka::future::Cache;

use crate::static_table::lookup_key;

/// Hit/miss counters
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups answered from cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

/// Caching wrapper around another geocoder
pub struct CachedGeocoder {
    inner: Box<dyn Geocoder>,
    cache: Cache<String, Option<GeoPoint>>,
    stats: CacheStats,
}

impl CachedGeocoder {
    /// Wrap `inner` with a cache holding up to `capacity` addresses
    pub fn new(inner: Box<dyn Geocoder>, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(capacity).build(),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[async_trait]
impl Geocoder for CachedGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        let key = lookup_key(address);

        if let Some(cached) = self.cache.get(&key).await {
            self.stats.record_hit();
            tracing::debug!("Geocode cache hit for {}", address);
            return Ok(cached);
        }

        self.stats.record_miss();
        let result = self.inner.geocode(address).await?;
        self.cache.insert(key, result).await;

        Ok(result)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoner_core::GeonerError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingGeocoder {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeonerError::GeocodeError("offline".to_string()));
            }
            Ok((address.to_lowercase() == "baghdad").then(|| GeoPoint::new(44.4, 33.3)))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn cached(fail: bool) -> (CachedGeocoder, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = CountingGeocoder {
            calls: calls.clone(),
            fail,
        };
        (CachedGeocoder::new(Box::new(inner), 100), calls)
    }

    #[tokio::test]
    async fn test_repeated_address_hits_cache() {
        let (geocoder, calls) = cached(false);

        let first = geocoder.geocode("Baghdad").await.unwrap();
        let second = geocoder.geocode("BAGHDAD").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(geocoder.stats().hits(), 1);
        assert_eq!(geocoder.stats().misses(), 1);
        assert_eq!(geocoder.stats().hit_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_no_candidate_is_cached() {
        let (geocoder, calls) = cached(false);

        assert_eq!(geocoder.geocode("Atlantis").await.unwrap(), None);
        assert_eq!(geocoder.geocode("Atlantis").await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (geocoder, calls) = cached(true);

        assert!(geocoder.geocode("Baghdad").await.is_err());
        assert!(geocoder.geocode("Baghdad").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(geocoder.name(), "counting");
    }
}
