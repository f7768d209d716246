//! GeoNER Store - Output sinks for located entities
//!
//! Writes `LocationRecord` batches to one of:
//! - a GeoPackage point feature class (SQLite via sqlx)
//! - a GeoJSON FeatureCollection file
//! - the console
//!
//! Author: hephaex@gmail.com

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use geoner_core::{GeonerError, LocationRecord, OutputConfig, OutputFormat};

pub mod console;
pub mod geojson;
pub mod geopackage;

pub use console::ConsoleSink;
pub use geojson::GeoJsonSink;
pub use geopackage::{encode_point, validate_workspace, GeoPackageStore, FEATURE_FIELDS};

// ============================================================================
// Errors
// ============================================================================

/// Output sink errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not a geodatabase: {path} ({reason})")]
    NotAGeodatabase { path: PathBuf, reason: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Failed to write {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Output path required for {0} output")]
    MissingPath(OutputFormat),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

impl From<StoreError> for GeonerError {
    fn from(e: StoreError) -> Self {
        GeonerError::StoreError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Sink Trait
// ============================================================================

/// What a sink wrote over its lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkSummary {
    /// Sink name
    pub sink: String,

    /// Rows or features written
    pub records: usize,

    /// Output file, if any
    pub location: Option<PathBuf>,
}

/// Destination for located entity rows
#[async_trait]
pub trait FeatureSink: Send {
    /// Write one batch; returns rows written
    async fn insert(&mut self, records: &[LocationRecord]) -> Result<usize>;

    /// Flush and close the output
    ///
    /// Calling it again writes nothing new and returns the same summary.
    async fn finish(&mut self) -> Result<SinkSummary>;

    /// Sink name
    fn name(&self) -> &str;
}

// ============================================================================
// Factory function
// ============================================================================

/// Check an output target without touching it
///
/// Lets callers reject a bad workspace before building anything else;
/// `create_sink` repeats the same checks.
pub fn validate_output(config: &OutputConfig) -> Result<()> {
    match config.format {
        OutputFormat::Console => Ok(()),
        OutputFormat::GeoJson => {
            let path = config
                .path
                .as_ref()
                .ok_or(StoreError::MissingPath(OutputFormat::GeoJson))?;
            geojson::check_parent_dir(path)
        }
        OutputFormat::GeoPackage => {
            let path = config
                .path
                .as_ref()
                .ok_or(StoreError::MissingPath(OutputFormat::GeoPackage))?;
            validate_workspace(path)
        }
    }
}

/// Create an output sink from config
///
/// Opening a GeoPackage rebuilds its feature class, so create the sink
/// only once every other component is ready.
pub async fn create_sink(config: &OutputConfig) -> Result<Box<dyn FeatureSink>> {
    match config.format {
        OutputFormat::Console => Ok(Box::new(ConsoleSink::stdout())),
        OutputFormat::GeoJson => {
            let path = config
                .path
                .as_ref()
                .ok_or(StoreError::MissingPath(OutputFormat::GeoJson))?;
            Ok(Box::new(GeoJsonSink::create(path)?))
        }
        OutputFormat::GeoPackage => {
            let path = config
                .path
                .as_ref()
                .ok_or(StoreError::MissingPath(OutputFormat::GeoPackage))?;
            Ok(Box::new(
                GeoPackageStore::create(path, &config.table_name).await?,
            ))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_console_sink() {
        let sink = create_sink(&OutputConfig::default()).await.unwrap();
        assert_eq!(sink.name(), "console");
    }

    #[tokio::test]
    async fn test_file_sinks_require_path() {
        for format in [OutputFormat::GeoJson, OutputFormat::GeoPackage] {
            let config = OutputConfig {
                format,
                ..Default::default()
            };
            assert!(matches!(
                create_sink(&config).await,
                Err(StoreError::MissingPath(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_create_geopackage_sink() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            format: OutputFormat::GeoPackage,
            path: Some(dir.path().join("out.gpkg")),
            ..Default::default()
        };

        let mut sink = create_sink(&config).await.unwrap();
        assert_eq!(sink.name(), "geopackage");
        let summary = sink.finish().await.unwrap();
        assert_eq!(summary.records, 0);
    }

    #[test]
    fn test_validate_output_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let gpkg = dir.path().join("out.gpkg");
        let config = OutputConfig {
            format: OutputFormat::GeoPackage,
            path: Some(gpkg.clone()),
            ..Default::default()
        };
        assert!(validate_output(&config).is_ok());
        assert!(!gpkg.exists());

        let config = OutputConfig {
            format: OutputFormat::GeoPackage,
            path: Some(dir.path().join("out.gdb")),
            ..Default::default()
        };
        assert!(matches!(
            validate_output(&config),
            Err(StoreError::NotAGeodatabase { .. })
        ));

        let config = OutputConfig {
            format: OutputFormat::GeoJson,
            path: Some(dir.path().join("missing/out.geojson")),
            ..Default::default()
        };
        assert!(validate_output(&config).is_err());
        assert!(validate_output(&OutputConfig::default()).is_ok());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: GeonerError = StoreError::DatabaseError("locked".to_string()).into();
        assert!(matches!(err, GeonerError::StoreError(msg) if msg.contains("locked")));
    }
}
