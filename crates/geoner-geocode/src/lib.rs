//! GeoNER Geocode - Address lookup clients
//!
//! Provides implementations of the `Geocoder` capability:
//! - ArcGIS World Geocoder (`findAddressCandidates` REST endpoint)
//! - Static place-name table for offline runs
//! - An optional lookup cache wrapping either of them
//!
//! Author: hephaex@gmail.com

use geoner_core::{Geocoder, GeocoderConfig, GeocoderProvider, GeonerError, Result};

pub mod arcgis;
pub mod cache;
pub mod static_table;

pub use arcgis::{parse_candidates, ArcGisGeocoder};
pub use cache::{CacheStats, CachedGeocoder};
pub use static_table::StaticGeocoder;

// ============================================================================
// Factory function
// ============================================================================

/// Create a geocoder from config
pub fn create_geocoder(config: &GeocoderConfig) -> Result<Box<dyn Geocoder>> {
    let geocoder: Box<dyn Geocoder> = match config.provider {
        GeocoderProvider::ArcGis => Box::new(ArcGisGeocoder::from_config(config)?),
        GeocoderProvider::Static => {
            let path = config.static_table.as_ref().ok_or_else(|| {
                GeonerError::ConfigError("geocoder.static_table required".to_string())
            })?;
            Box::new(StaticGeocoder::from_file(path)?)
        }
    };

    if config.cache_capacity > 0 {
        tracing::debug!(
            "Caching up to {} geocode lookups",
            config.cache_capacity
        );
        return Ok(Box::new(CachedGeocoder::new(
            geocoder,
            config.cache_capacity,
        )));
    }

    Ok(geocoder)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_arcgis_geocoder() {
        let geocoder = create_geocoder(&GeocoderConfig::default()).unwrap();
        assert_eq!(geocoder.name(), "arcgis");
    }

    #[test]
    fn test_static_provider_requires_table() {
        let config = GeocoderConfig {
            provider: GeocoderProvider::Static,
            ..Default::default()
        };
        assert!(matches!(
            create_geocoder(&config),
            Err(GeonerError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_cached_static_geocoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.tsv");
        std::fs::write(&path, "Basra\t30.5\t47.8\n").unwrap();

        let config = GeocoderConfig {
            provider: GeocoderProvider::Static,
            static_table: Some(path),
            cache_capacity: 16,
            ..Default::default()
        };

        let geocoder = create_geocoder(&config).unwrap();
        assert_eq!(geocoder.name(), "static");
        let point = geocoder.geocode("basra").await.unwrap().unwrap();
        assert_eq!(point.lon, 47.8);
    }
}
