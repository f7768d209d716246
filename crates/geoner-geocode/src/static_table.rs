//! Offline geocoder backed by a place-name table.
//!
//! Table format is tab-separated `name<TAB>lat<TAB>lon`, one place per
//! line. Blank lines and lines starting with `#` are ignored. Lookups are
//! case-insensitive and ignore repeated whitespace.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use geoner_core::{GeoPoint, Geocoder, GeonerError, Result};

/// Normalise an address into a lookup key
pub(crate) fn lookup_key(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// In-memory place-name geocoder
#[derive(Debug, Default, Clone)]
pub struct StaticGeocoder {
    places: HashMap<String, GeoPoint>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a tab-separated table
    pub fn from_table(table: &str) -> Result<Self> {
        let mut geocoder = Self::new();

        for (line_no, line) in table.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                return Err(GeonerError::GeocodeError(format!(
                    "Place table line {}: expected name, lat, lon",
                    line_no + 1
                )));
            }

            let parse = |value: &str, what: &str| {
                value.trim().parse::<f64>().map_err(|_| {
                    GeonerError::GeocodeError(format!(
                        "Place table line {}: invalid {what} '{value}'",
                        line_no + 1
                    ))
                })
            };
            let lat = parse(fields[1], "latitude")?;
            let lon = parse(fields[2], "longitude")?;

            geocoder.insert(fields[0], GeoPoint::new(lon, lat));
        }

        Ok(geocoder)
    }

    /// Load a table from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let table = std::fs::read_to_string(path).map_err(|e| {
            GeonerError::GeocodeError(format!(
                "Failed to read place table {}: {e}",
                path.display()
            ))
        })?;
        Self::from_table(&table)
    }

    /// Add or replace a place
    pub fn insert(&mut self, name: &str, point: GeoPoint) {
        self.places.insert(lookup_key(name), point);
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        Ok(self.places.get(&lookup_key(address)).copied())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "# name\tlat\tlon\nBaghdad\t33.3\t44.4\nKuwait City\t29.37\t47.98\n\n";

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let geocoder = StaticGeocoder::from_table(TABLE).unwrap();
        assert_eq!(geocoder.len(), 2);

        let point = geocoder.geocode("BAGHDAD").await.unwrap().unwrap();
        assert_eq!(point, GeoPoint::new(44.4, 33.3));

        let point = geocoder.geocode(" kuwait   city ").await.unwrap().unwrap();
        assert_eq!(point.lat, 29.37);
    }

    #[tokio::test]
    async fn test_unknown_place_is_none() {
        let geocoder = StaticGeocoder::from_table(TABLE).unwrap();
        assert_eq!(geocoder.geocode("Atlantis").await.unwrap(), None);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = StaticGeocoder::from_table("Baghdad\t33.3\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));

        let err = StaticGeocoder::from_table("Basra\tnorth\t47.8\n").unwrap_err();
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.tsv");
        std::fs::write(&path, TABLE).unwrap();

        let geocoder = StaticGeocoder::from_file(&path).unwrap();
        assert!(!geocoder.is_empty());
        assert!(StaticGeocoder::from_file(&dir.path().join("missing.tsv")).is_err());
    }
}
