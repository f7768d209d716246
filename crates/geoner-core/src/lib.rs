//! GeoNER Core - Domain records, traits, and shared types
//!
//! This crate defines the core abstractions used throughout GeoNER:
//! - Entity labels (OntoNotes categories with their numeric codes)
//! - Entity and location records flowing from extraction to storage
//! - Common error types
//! - Capability traits for entity recognition and geocoding
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, CaseMode, ConfigError, GeocoderConfig, GeocoderProvider, InputConfig,
    LoggingConfig, NerBackend, NerConfig, OutputConfig, OutputFormat,
};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for GeoNER operations
#[derive(Error, Debug)]
pub enum GeonerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Geocoding error: {0}")]
    GeocodeError(String),

    #[error("Entity recognition error: {0}")]
    RecognitionError(String),

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Storage error: {0}")]
    StoreError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for GeonerError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeonerError>;

// ============================================================================
// Entity Labels
// ============================================================================

/// Named-entity categories (OntoNotes 5 scheme)
///
/// Built-in labels carry the numeric code the spaCy symbol table assigns
/// them. Labels a model emits outside this set are kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityLabel {
    Person,
    Norp,
    Facility,
    Organization,
    /// Geographic-political entity (countries, cities, states)
    Gpe,
    Location,
    Product,
    Event,
    WorkOfArt,
    Law,
    Language,
    Date,
    Time,
    Percent,
    Money,
    Quantity,
    Ordinal,
    Cardinal,
    Other(String),
}

impl EntityLabel {
    /// All built-in labels in code order
    pub const BUILTIN: [EntityLabel; 18] = [
        Self::Person,
        Self::Norp,
        Self::Facility,
        Self::Organization,
        Self::Gpe,
        Self::Location,
        Self::Product,
        Self::Event,
        Self::WorkOfArt,
        Self::Law,
        Self::Language,
        Self::Date,
        Self::Time,
        Self::Percent,
        Self::Money,
        Self::Quantity,
        Self::Ordinal,
        Self::Cardinal,
    ];

    /// Get the label name as emitted by the model
    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "PERSON",
            Self::Norp => "NORP",
            Self::Facility => "FAC",
            Self::Organization => "ORG",
            Self::Gpe => "GPE",
            Self::Location => "LOC",
            Self::Product => "PRODUCT",
            Self::Event => "EVENT",
            Self::WorkOfArt => "WORK_OF_ART",
            Self::Law => "LAW",
            Self::Language => "LANGUAGE",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Percent => "PERCENT",
            Self::Money => "MONEY",
            Self::Quantity => "QUANTITY",
            Self::Ordinal => "ORDINAL",
            Self::Cardinal => "CARDINAL",
            Self::Other(name) => name,
        }
    }

    /// Numeric label code, `None` for labels outside the built-in scheme
    pub fn code(&self) -> Option<u64> {
        let code = match self {
            Self::Person => 380,
            Self::Norp => 381,
            Self::Facility => 382,
            Self::Organization => 383,
            Self::Gpe => 384,
            Self::Location => 385,
            Self::Product => 386,
            Self::Event => 387,
            Self::WorkOfArt => 388,
            Self::Law => 389,
            Self::Language => 390,
            Self::Date => 391,
            Self::Time => 392,
            Self::Percent => 393,
            Self::Money => 394,
            Self::Quantity => 395,
            Self::Ordinal => 396,
            Self::Cardinal => 397,
            Self::Other(_) => return None,
        };
        Some(code)
    }

    /// Parse a label name; unknown names become `Other` (upper-cased)
    pub fn parse(name: &str) -> Self {
        let upper = name.trim().to_uppercase();
        Self::BUILTIN
            .iter()
            .find(|label| label.as_str() == upper)
            .cloned()
            .unwrap_or(Self::Other(upper))
    }

    /// Whether this is the geographic-political category
    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Gpe)
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityLabel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for EntityLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityLabel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// A WGS84 (EPSG:4326) point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude (x)
    pub lon: f64,

    /// Latitude (y)
    pub lat: f64,
}

impl GeoPoint {
    /// Create a point from longitude and latitude
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "POINT ({} {})", self.lon, self.lat)
    }
}

/// EPSG code of the coordinate reference system for all output geometry
pub const WGS84_SRID: i32 = 4326;

// ============================================================================
// Recognition and Extraction Records
// ============================================================================

/// A span produced by an entity recognizer
///
/// `start` and `end` are byte offsets into the analysed text and always
/// fall on char boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedEntity {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
}

impl RecognizedEntity {
    /// Create a span, taking the surface text from `source`
    pub fn from_span(source: &str, start: usize, end: usize, label: EntityLabel) -> Self {
        Self {
            text: source[start..end].to_string(),
            label,
            start,
            end,
        }
    }
}

/// One detected entity in one document
///
/// The coordinates are present exactly when the record is spatial; the
/// only constructors are [`EntityRecord::spatial`] and
/// [`EntityRecord::non_spatial`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Source file identifier
    pub document: String,

    /// Numeric label code as text (empty for labels without a code)
    pub entity_id: String,

    /// Categorical label
    pub entity_type: EntityLabel,

    /// Surface text of the entity span
    pub entity: String,

    /// Context preceding the span
    pub pre_text: String,

    /// Context following the span
    pub post_text: String,

    location: Option<GeoPoint>,
}

impl EntityRecord {
    fn build(
        document: impl Into<String>,
        entity: &RecognizedEntity,
        location: Option<GeoPoint>,
    ) -> Self {
        Self {
            document: document.into(),
            entity_id: entity
                .label
                .code()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            entity_type: entity.label.clone(),
            entity: entity.text.clone(),
            pre_text: String::new(),
            post_text: String::new(),
            location,
        }
    }

    /// A geocoded geographic entity
    pub fn spatial(
        document: impl Into<String>,
        entity: &RecognizedEntity,
        location: GeoPoint,
    ) -> Self {
        Self::build(document, entity, Some(location))
    }

    /// An entity without coordinates
    pub fn non_spatial(document: impl Into<String>, entity: &RecognizedEntity) -> Self {
        Self::build(document, entity, None)
    }

    /// Attach surrounding context
    pub fn with_context(mut self, pre_text: impl Into<String>, post_text: impl Into<String>) -> Self {
        self.pre_text = pre_text.into();
        self.post_text = post_text.into();
        self
    }

    pub fn spatial_entity(&self) -> bool {
        self.location.is_some()
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn lat(&self) -> Option<f64> {
        self.location.map(|p| p.lat)
    }

    pub fn lon(&self) -> Option<f64> {
        self.location.map(|p| p.lon)
    }
}

impl Serialize for EntityRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = if self.location.is_some() { 9 } else { 7 };
        let mut state = serializer.serialize_struct("EntityRecord", fields)?;
        state.serialize_field("document", &self.document)?;
        state.serialize_field("entity_id", &self.entity_id)?;
        state.serialize_field("entity_type", &self.entity_type)?;
        state.serialize_field("entity", &self.entity)?;
        state.serialize_field("spatial_entity", &self.spatial_entity())?;
        if let Some(point) = self.location {
            state.serialize_field("lat", &point.lat)?;
            state.serialize_field("lon", &point.lon)?;
        }
        state.serialize_field("pre_text", &self.pre_text)?;
        state.serialize_field("post_text", &self.post_text)?;
        state.end()
    }
}

/// A spatial entity reshaped for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub document: String,
    pub entity_id: String,
    pub entity_type: String,
    pub extracted_value: String,
    pub pre_text: String,
    pub post_text: String,
    pub lon: f64,
    pub lat: f64,
}

impl LocationRecord {
    /// Reshape a spatial record; returns `None` for non-spatial ones
    pub fn from_entity(record: &EntityRecord) -> Option<Self> {
        let point = record.location()?;
        Some(Self {
            document: record.document.clone(),
            entity_id: record.entity_id.clone(),
            entity_type: record.entity_type.to_string(),
            extracted_value: record.entity.clone(),
            pre_text: record.pre_text.clone(),
            post_text: record.post_text.clone(),
            lon: point.lon,
            lat: point.lat,
        })
    }

    /// Point geometry for this row
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lon, self.lat)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Address lookup capability
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-text address to its best candidate
    ///
    /// `Ok(None)` means the service answered but had no candidate; transport
    /// and decoding failures are reported as errors.
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Named-entity recognition capability
#[async_trait::async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Detect entities in document order
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
