//! GeoNER Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default ArcGIS World Geocoder endpoint
pub const ARCGIS_WORLD_GEOCODER_URL: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Input document directory
    pub input: InputConfig,

    /// Entity recognition backend
    pub ner: NerConfig,

    /// Geocoding provider
    pub geocoder: GeocoderConfig,

    /// Output sink
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Input
        if let Ok(dir) = std::env::var("GEONER_INPUT_DIR") {
            self.input.directory = PathBuf::from(dir);
        }
        if let Ok(mode) = std::env::var("GEONER_CASE_MODE") {
            self.input.case_mode = mode.parse()?;
        }

        // NER
        if let Ok(backend) = std::env::var("NER_BACKEND") {
            self.ner.backend = backend.parse()?;
        }
        if let Ok(url) = std::env::var("NER_URL") {
            self.ner.remote_url = Some(url);
        }

        // Geocoder
        if let Ok(provider) = std::env::var("GEOCODER_PROVIDER") {
            self.geocoder.provider = provider.parse()?;
        }
        if let Ok(url) = std::env::var("GEOCODER_URL") {
            self.geocoder.url = url;
        }
        if let Ok(token) = std::env::var("ARCGIS_TOKEN") {
            self.geocoder.token = Some(token);
        }

        // Output
        if let Ok(format) = std::env::var("GEONER_OUTPUT_FORMAT") {
            self.output.format = format.parse()?;
        }
        if let Ok(path) = std::env::var("GEONER_OUTPUT_PATH") {
            self.output.path = Some(PathBuf::from(path));
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Check cross-field requirements before a run starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ner.backend == NerBackend::Remote && self.ner.remote_url.is_none() {
            return Err(ConfigError::MissingRequired("ner.remote_url".to_string()));
        }

        if self.geocoder.provider == GeocoderProvider::Static
            && self.geocoder.static_table.is_none()
        {
            return Err(ConfigError::MissingRequired(
                "geocoder.static_table".to_string(),
            ));
        }

        if self.output.format != OutputFormat::Console && self.output.path.is_none() {
            return Err(ConfigError::MissingRequired("output.path".to_string()));
        }

        if !is_table_name(&self.output.table_name) {
            return Err(ConfigError::InvalidValue {
                key: "output.table_name".to_string(),
                value: self.output.table_name.clone(),
            });
        }

        Ok(())
    }
}

/// Prefixes of tables owned by SQLite or the GeoPackage format
const RESERVED_TABLE_PREFIXES: [&str; 3] = ["gpkg_", "rtree_", "sqlite_"];

/// True for a plain identifier that does not shadow a system table
///
/// Table names are interpolated into SQL and the layer is dropped and
/// recreated on every run.
pub fn is_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    let lower = name.to_ascii_lowercase();
    plain
        && !RESERVED_TABLE_PREFIXES
            .iter()
            .any(|prefix| lower.starts_with(prefix))
}

/// Input document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory scanned (non-recursively) for documents
    pub directory: PathBuf,

    /// File extensions to accept; empty accepts every file
    pub extensions: Vec<String>,

    /// Case normalization applied before recognition
    pub case_mode: CaseMode,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./documents"),
            extensions: Vec::new(),
            case_mode: CaseMode::Preserve,
        }
    }
}

/// Case normalization of document text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMode {
    /// Analyse the text as written
    #[default]
    Preserve,
    /// Title-case every word before analysis
    Title,
}

impl std::str::FromStr for CaseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preserve" | "none" => Ok(Self::Preserve),
            "title" => Ok(Self::Title),
            _ => Err(ConfigError::InvalidValue {
                key: "GEONER_CASE_MODE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Entity recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerConfig {
    /// Recognizer backend
    pub backend: NerBackend,

    /// Endpoint of the remote NER service
    pub remote_url: Option<String>,

    /// Extra gazetteer files for the rule-based recognizer
    pub gazetteer_paths: Vec<PathBuf>,

    /// Labels dropped from the output entirely
    pub excluded_labels: Vec<String>,

    /// Remote request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            backend: NerBackend::Rules,
            remote_url: None,
            gazetteer_paths: Vec::new(),
            excluded_labels: vec!["CARDINAL".to_string()],
            timeout_secs: 60,
        }
    }
}

/// Supported recognizer backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NerBackend {
    Rules,
    Remote,
}

impl std::str::FromStr for NerBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rules" | "rule" => Ok(Self::Rules),
            "remote" => Ok(Self::Remote),
            _ => Err(ConfigError::InvalidValue {
                key: "NER_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Geocoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Geocoding provider
    pub provider: GeocoderProvider,

    /// `findAddressCandidates` endpoint
    pub url: String,

    /// Optional ArcGIS access token
    pub token: Option<String>,

    /// Tab-separated `name lat lon` table for the static provider
    pub static_table: Option<PathBuf>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Lookup cache capacity; 0 disables caching
    pub cache_capacity: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            provider: GeocoderProvider::ArcGis,
            url: ARCGIS_WORLD_GEOCODER_URL.to_string(),
            token: None,
            static_table: None,
            timeout_secs: 30,
            cache_capacity: 0,
        }
    }
}

/// Supported geocoding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderProvider {
    ArcGis,
    Static,
}

impl std::str::FromStr for GeocoderProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arcgis" => Ok(Self::ArcGis),
            "static" => Ok(Self::Static),
            _ => Err(ConfigError::InvalidValue {
                key: "GEOCODER_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Output sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sink format
    pub format: OutputFormat,

    /// Output file (GeoJSON file or GeoPackage workspace)
    pub path: Option<PathBuf>,

    /// Feature class name inside a GeoPackage
    pub table_name: String,

    /// Characters of context captured on each side of an entity
    pub context_width: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Console,
            path: None,
            table_name: "entity_locations".to_string(),
            context_width: 255,
        }
    }
}

/// Supported output sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    GeoJson,
    GeoPackage,
}

impl OutputFormat {
    /// Guess the format from an output file extension
    pub fn infer_from_path(path: &std::path::Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "gpkg" => Some(Self::GeoPackage),
            "geojson" | "json" => Some(Self::GeoJson),
            _ => None,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "geojson" => Ok(Self::GeoJson),
            "geopackage" | "gpkg" => Ok(Self::GeoPackage),
            _ => Err(ConfigError::InvalidValue {
                key: "GEONER_OUTPUT_FORMAT".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Console => write!(f, "console"),
            Self::GeoJson => write!(f, "geojson"),
            Self::GeoPackage => write!(f, "geopackage"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.output.context_width, 255);
        assert_eq!(config.ner.excluded_labels, vec!["CARDINAL".to_string()]);
        assert_eq!(config.geocoder.url, ARCGIS_WORLD_GEOCODER_URL);
        assert_eq!(config.input.case_mode, CaseMode::Preserve);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enum_parse() {
        assert_eq!("rules".parse::<NerBackend>().unwrap(), NerBackend::Rules);
        assert_eq!(
            "ArcGIS".parse::<GeocoderProvider>().unwrap(),
            GeocoderProvider::ArcGis
        );
        assert_eq!(
            "gpkg".parse::<OutputFormat>().unwrap(),
            OutputFormat::GeoPackage
        );
        assert_eq!("title".parse::<CaseMode>().unwrap(), CaseMode::Title);
        assert!("spacy".parse::<NerBackend>().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [input]
            directory = "/data/reports"
            case_mode = "title"

            [output]
            format = "geopackage"
            path = "out.gpkg"
            "#,
        )
        .unwrap();

        assert_eq!(config.input.directory, PathBuf::from("/data/reports"));
        assert_eq!(config.input.case_mode, CaseMode::Title);
        assert_eq!(config.output.format, OutputFormat::GeoPackage);
        assert_eq!(config.output.table_name, "entity_locations");
        assert_eq!(config.geocoder.provider, GeocoderProvider::ArcGis);
    }

    #[test]
    fn test_validate_requirements() {
        let mut config = AppConfig::default();
        config.ner.backend = NerBackend::Remote;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let mut config = AppConfig::default();
        config.output.format = OutputFormat::GeoJson;
        assert!(config.validate().is_err());
        config.output.path = Some(PathBuf::from("out.geojson"));
        assert!(config.validate().is_ok());

        for name in [
            "locations; DROP TABLE x",
            "gpkg_contents",
            "SQLite_sequence",
            "rtree_x_geom",
        ] {
            let mut config = AppConfig::default();
            config.output.table_name = name.to_string();
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_table_names() {
        assert!(is_table_name("entity_locations"));
        assert!(is_table_name("_layer2"));
        assert!(is_table_name("my_gpkg_layer"));
        assert!(!is_table_name(""));
        assert!(!is_table_name("2layer"));
        assert!(!is_table_name("gpkg_geometry_columns"));
        assert!(!is_table_name("sqlite_master"));
    }

    #[test]
    fn test_infer_format() {
        assert_eq!(
            OutputFormat::infer_from_path(std::path::Path::new("a/b.GPKG")),
            Some(OutputFormat::GeoPackage)
        );
        assert_eq!(
            OutputFormat::infer_from_path(std::path::Path::new("b.geojson")),
            Some(OutputFormat::GeoJson)
        );
        assert_eq!(
            OutputFormat::infer_from_path(std::path::Path::new("b.gdb")),
            None
        );
    }
}
