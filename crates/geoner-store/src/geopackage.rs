//! GeoPackage feature class store
//!
//! Writes located entities as a point layer in an OGC GeoPackage (a SQLite
//! file readable by ArcGIS Pro, QGIS and GDAL). Every run rebuilds the
//! layer from scratch.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use geoner_core::config::is_table_name;
use geoner_core::{GeoPoint, LocationRecord, WGS84_SRID};

use crate::{FeatureSink, Result, SinkSummary, StoreError};

/// `PRAGMA application_id` of a GeoPackage ("GPKG")
pub const GPKG_APPLICATION_ID: i32 = 0x4750_4B47;

/// `PRAGMA user_version` for GeoPackage 1.3
pub const GPKG_USER_VERSION: i32 = 10300;

/// Attribute columns in insertion order, followed by the geometry column
pub const FEATURE_FIELDS: [&str; 9] = [
    "document",
    "entity_id",
    "entity_type",
    "extracted_value",
    "pre_text",
    "post_text",
    "lon",
    "lat",
    "geom",
];

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

// GeoPackage 1.0 and 1.1 files carry "GP10" / "GP11"
const LEGACY_APPLICATION_IDS: [i32; 2] = [0x4750_3130, 0x4750_3131];

const WGS84_WKT: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4326\"]]";

const CREATE_SPATIAL_REF_SYS: &str = "CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
)";

const CREATE_CONTENTS: &str = "CREATE TABLE IF NOT EXISTS gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
)";

const CREATE_GEOMETRY_COLUMNS: &str = "CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT uk_gc_table_name UNIQUE (table_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
)";

// ============================================================================
// Geometry Encoding
// ============================================================================

/// Encode a point as a GeoPackage geometry blob
///
/// Standard header (`GP`, version 0, little-endian, no envelope, srs_id)
/// followed by a little-endian WKB Point.
pub fn encode_point(point: GeoPoint) -> Vec<u8> {
    let mut blob = Vec::with_capacity(29);
    blob.extend_from_slice(b"GP");
    blob.push(0);
    blob.push(0b0000_0001);
    blob.extend_from_slice(&WGS84_SRID.to_le_bytes());

    blob.push(1);
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&point.lon.to_le_bytes());
    blob.extend_from_slice(&point.lat.to_le_bytes());
    blob
}

/// Running bounding box of written points
#[derive(Debug, Clone, Copy)]
struct Extent {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Extent {
    fn of(point: GeoPoint) -> Self {
        Self {
            min_x: point.lon,
            min_y: point.lat,
            max_x: point.lon,
            max_y: point.lat,
        }
    }

    fn include(&mut self, point: GeoPoint) {
        self.min_x = self.min_x.min(point.lon);
        self.min_y = self.min_y.min(point.lat);
        self.max_x = self.max_x.max(point.lon);
        self.max_y = self.max_y.max(point.lat);
    }
}

// ============================================================================
// Workspace Validation
// ============================================================================

fn not_a_geodatabase(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::NotAGeodatabase {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Check that `path` can hold a GeoPackage
///
/// The extension must be `.gpkg`. An existing non-empty file must be a
/// SQLite database stamped with a GeoPackage application id.
pub fn validate_workspace(path: &Path) -> Result<()> {
    let is_gpkg = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("gpkg"))
        .unwrap_or(false);
    if !is_gpkg {
        return Err(not_a_geodatabase(path, "expected a .gpkg file"));
    }

    if path.is_dir() {
        return Err(not_a_geodatabase(path, "is a directory"));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(not_a_geodatabase(path, "parent directory does not exist"));
        }
    }

    if !path.exists() {
        return Ok(());
    }

    let mut header = Vec::with_capacity(100);
    std::fs::File::open(path)
        .and_then(|f| f.take(100).read_to_end(&mut header))
        .map_err(|source| StoreError::IoError {
            path: path.to_path_buf(),
            source,
        })?;

    if header.is_empty() {
        return Ok(());
    }
    if header.len() < 100 || &header[..16] != SQLITE_MAGIC {
        return Err(not_a_geodatabase(path, "not a SQLite database"));
    }

    // Header offset 68: application id, big-endian
    let application_id = i32::from_be_bytes([header[68], header[69], header[70], header[71]]);
    if application_id != GPKG_APPLICATION_ID && !LEGACY_APPLICATION_IDS.contains(&application_id)
    {
        return Err(not_a_geodatabase(
            path,
            format!("application_id {application_id:#010x} is not GeoPackage"),
        ));
    }

    Ok(())
}

// ============================================================================
// GeoPackage Store
// ============================================================================

/// Point feature class inside a GeoPackage file
pub struct GeoPackageStore {
    pool: SqlitePool,
    path: PathBuf,
    table: String,
    insert_sql: String,
    written: usize,
    extent: Option<Extent>,
}

impl GeoPackageStore {
    fn summary(&self) -> SinkSummary {
        SinkSummary {
            sink: self.name().to_string(),
            records: self.written,
            location: Some(self.path.clone()),
        }
    }

    /// Open or create the workspace and rebuild the feature class `table`
    pub async fn create(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref();
        validate_workspace(path)?;
        if !is_table_name(table) {
            return Err(StoreError::DatabaseError(format!(
                "Invalid feature class name: {table}"
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("SQLite connection failed: {e}")))?;

        let store = Self {
            pool,
            path: path.to_path_buf(),
            table: table.to_string(),
            insert_sql: format!(
                "INSERT INTO \"{table}\" ({}) VALUES ({})",
                FEATURE_FIELDS.join(", "),
                vec!["?"; FEATURE_FIELDS.len()].join(", ")
            ),
            written: 0,
            extent: None,
        };

        store.init_metadata().await?;
        store.create_feature_class().await?;

        tracing::info!(
            "Created feature class {} in {}",
            store.table,
            store.path.display()
        );

        Ok(store)
    }

    /// Ordered insertion field list
    pub fn fields(&self) -> &'static [&'static str] {
        &FEATURE_FIELDS
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn init_metadata(&self) -> Result<()> {
        sqlx::query(&format!("PRAGMA application_id = {GPKG_APPLICATION_ID}"))
            .execute(&self.pool)
            .await?;
        sqlx::query(&format!("PRAGMA user_version = {GPKG_USER_VERSION}"))
            .execute(&self.pool)
            .await?;

        for ddl in [CREATE_SPATIAL_REF_SYS, CREATE_CONTENTS, CREATE_GEOMETRY_COLUMNS] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }

        sqlx::query(
            "INSERT OR IGNORE INTO gpkg_spatial_ref_sys \
             (srs_name, srs_id, organization, organization_coordsys_id, definition, description) \
             VALUES \
             ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', 'undefined cartesian coordinate reference system'), \
             ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', 'undefined geographic coordinate reference system'), \
             ('WGS 84 geodetic', ?, 'EPSG', ?, ?, 'longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid')",
        )
        .bind(WGS84_SRID)
        .bind(WGS84_SRID)
        .bind(WGS84_WKT)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_feature_class(&self) -> Result<()> {
        let table = &self.table;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM gpkg_geometry_columns WHERE table_name = ?")
            .bind(table)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM gpkg_contents WHERE table_name = ?")
            .bind(table)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS \"{table}\""))
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            "CREATE TABLE \"{table}\" (
                fid INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                geom POINT,
                document TEXT,
                entity_id TEXT,
                entity_type TEXT,
                extracted_value TEXT,
                pre_text TEXT,
                post_text TEXT,
                lon REAL,
                lat REAL
            )"
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO gpkg_contents (table_name, data_type, identifier, description, last_change, srs_id) \
             VALUES (?, 'features', ?, 'Geocoded named entities', ?, ?)",
        )
        .bind(table)
        .bind(table)
        .bind(timestamp())
        .bind(WGS84_SRID)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO gpkg_geometry_columns (table_name, column_name, geometry_type_name, srs_id, z, m) \
             VALUES (?, 'geom', 'POINT', ?, 0, 0)",
        )
        .bind(table)
        .bind(WGS84_SRID)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[async_trait]
impl FeatureSink for GeoPackageStore {
    async fn insert(&mut self, records: &[LocationRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        // Rolled back on drop if any row fails
        let mut tx = self.pool.begin().await?;

        for record in records {
            // Bind order follows FEATURE_FIELDS
            sqlx::query(&self.insert_sql)
                .bind(&record.document)
                .bind(&record.entity_id)
                .bind(&record.entity_type)
                .bind(&record.extracted_value)
                .bind(&record.pre_text)
                .bind(&record.post_text)
                .bind(record.lon)
                .bind(record.lat)
                .bind(encode_point(record.point()))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        for record in records {
            let point = record.point();
            match self.extent.as_mut() {
                Some(extent) => extent.include(point),
                None => self.extent = Some(Extent::of(point)),
            }
        }
        self.written += records.len();

        tracing::debug!("Inserted {} rows into {}", records.len(), self.table);
        Ok(records.len())
    }

    async fn finish(&mut self) -> Result<SinkSummary> {
        if self.pool.is_closed() {
            return Ok(self.summary());
        }

        if let Some(extent) = self.extent {
            sqlx::query(
                "UPDATE gpkg_contents SET min_x = ?, min_y = ?, max_x = ?, max_y = ?, last_change = ? \
                 WHERE table_name = ?",
            )
            .bind(extent.min_x)
            .bind(extent.min_y)
            .bind(extent.max_x)
            .bind(extent.max_y)
            .bind(timestamp())
            .bind(&self.table)
            .execute(&self.pool)
            .await?;
        }

        self.pool.close().await;

        tracing::info!(
            "Wrote {} features to {}",
            self.written,
            self.path.display()
        );

        Ok(self.summary())
    }

    fn name(&self) -> &str {
        "geopackage"
    }
}

// ============================================================================
// Tests
// ============================================================================
