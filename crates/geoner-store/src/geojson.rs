//! GeoJSON FeatureCollection sink

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use geoner_core::LocationRecord;

use crate::{FeatureSink, Result, SinkSummary, StoreError};

/// Collects features and writes one FeatureCollection on `finish`
pub struct GeoJsonSink {
    path: PathBuf,
    features: Vec<Value>,
}

impl GeoJsonSink {
    /// Create a sink writing to `path`; the parent directory must exist
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_parent_dir(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            features: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Fail if the directory `path` would be written into is missing
pub(crate) fn check_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            Err(StoreError::IoError {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "parent directory does not exist",
                ),
            })
        }
        _ => Ok(()),
    }
}

/// One point feature; properties carry the same fields as the GeoPackage layer
pub fn to_feature(record: &LocationRecord) -> Result<Value> {
    let properties = serde_json::to_value(record)
        .map_err(|e| StoreError::SerializationError(format!("Failed to encode feature: {e}")))?;

    Ok(json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": [record.lon, record.lat],
        },
        "properties": properties,
    }))
}

#[async_trait]
impl FeatureSink for GeoJsonSink {
    async fn insert(&mut self, records: &[LocationRecord]) -> Result<usize> {
        for record in records {
            self.features.push(to_feature(record)?);
        }
        Ok(records.len())
    }

    async fn finish(&mut self) -> Result<SinkSummary> {
        // Features are kept, so finishing again rewrites the same collection
        let records = self.features.len();
        let collection = json!({
            "type": "FeatureCollection",
            "features": self.features,
        });

        let body = serde_json::to_vec_pretty(&collection)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|source| StoreError::IoError {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!("Wrote {} features to {}", records, self.path.display());

        Ok(SinkSummary {
            sink: self.name().to_string(),
            records,
            location: Some(self.path.clone()),
        })
    }

    fn name(&self) -> &str {
        "geojson"
    }
}
