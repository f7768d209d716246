//! GeoNER Extractor - Entity extraction pipeline
//!
//! Runs Named Entity Recognition over a document, drops excluded
//! categories, geocodes geographic-political entities, and shapes the
//! results into `EntityRecord`s with surrounding context.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use geoner_core::{
    EntityLabel, EntityRecognizer, EntityRecord, Geocoder, NerBackend, NerConfig, Result,
};

pub mod context;
pub mod ner;
pub mod remote;

pub use context::{context_window, DEFAULT_CONTEXT_WIDTH};
pub use ner::RuleBasedNer;
pub use remote::RemoteNer;

// ============================================================================
// Extraction Statistics
// ============================================================================

/// Counters for one or more extraction passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Spans returned by the recognizer
    pub recognized: usize,
    /// Spans dropped because their label is excluded
    pub excluded: usize,
    /// Records emitted without coordinates
    pub non_spatial: usize,
    /// Geographic entities that resolved to a point
    pub geocoded: usize,
    /// Geographic entities with no geocoder candidate
    pub not_found: usize,
    /// Geographic entities whose lookup failed
    pub geocode_errors: usize,
}

impl ExtractionStats {
    /// Accumulate another pass
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.recognized += other.recognized;
        self.excluded += other.excluded;
        self.non_spatial += other.non_spatial;
        self.geocoded += other.geocoded;
        self.not_found += other.not_found;
        self.geocode_errors += other.geocode_errors;
    }

    /// Records emitted (spatial and non-spatial)
    pub fn records(&self) -> usize {
        self.non_spatial + self.geocoded
    }
}

/// Output of one extraction pass
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<EntityRecord>,
    pub stats: ExtractionStats,
}

impl Extraction {
    /// Records that carry coordinates
    pub fn spatial(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter().filter(|r| r.spatial_entity())
    }
}

// ============================================================================
// Spatial Entity Extractor
// ============================================================================

/// Turns document text into entity records, geocoding places on the way
pub struct SpatialEntityExtractor {
    recognizer: Box<dyn EntityRecognizer>,
    geocoder: Box<dyn Geocoder>,
    excluded: HashSet<EntityLabel>,
    context_width: usize,
}

impl SpatialEntityExtractor {
    /// Create an extractor that drops CARDINAL entities
    pub fn new(recognizer: Box<dyn EntityRecognizer>, geocoder: Box<dyn Geocoder>) -> Self {
        Self {
            recognizer,
            geocoder,
            excluded: HashSet::from([EntityLabel::Cardinal]),
            context_width: DEFAULT_CONTEXT_WIDTH,
        }
    }

    /// Replace the excluded label set
    pub fn with_excluded_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded = labels
            .into_iter()
            .map(|l| EntityLabel::parse(l.as_ref()))
            .collect();
        self
    }

    /// Set context width in characters
    pub fn with_context_width(mut self, width: usize) -> Self {
        self.context_width = width;
        self
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    pub fn geocoder_name(&self) -> &str {
        self.geocoder.name()
    }

    /// Extract entity records from one document
    ///
    /// Recognizer failures are returned as errors. Geocoder failures only
    /// drop the affected entity.
    pub async fn extract(&self, document: &str, text: &str) -> Result<Extraction> {
        tracing::info!("Processing {}", document);

        let entities = self.recognizer.recognize(text).await?;
        let mut extraction = Extraction {
            records: Vec::with_capacity(entities.len()),
            stats: ExtractionStats {
                recognized: entities.len(),
                ..Default::default()
            },
        };

        for entity in &entities {
            if self.excluded.contains(&entity.label) {
                extraction.stats.excluded += 1;
                continue;
            }

            let record = if entity.label.is_geographic() {
                match self.geocoder.geocode(&entity.text).await {
                    Ok(Some(point)) => {
                        extraction.stats.geocoded += 1;
                        EntityRecord::spatial(document, entity, point)
                    }
                    Ok(None) => {
                        extraction.stats.not_found += 1;
                        tracing::warn!("No location found for {} in {}", entity.text, document);
                        continue;
                    }
                    Err(e) => {
                        extraction.stats.geocode_errors += 1;
                        tracing::error!("Geocoding {} failed: {}", entity.text, e);
                        continue;
                    }
                }
            } else {
                extraction.stats.non_spatial += 1;
                EntityRecord::non_spatial(document, entity)
            };

            let (pre, post) = context_window(text, entity.start, entity.end, self.context_width);
            extraction.records.push(record.with_context(pre, post));
        }

        tracing::info!(
            "Found {} entities in {} ({} spatial)",
            extraction.records.len(),
            document,
            extraction.stats.geocoded
        );

        Ok(extraction)
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an entity recognizer from config
pub fn create_recognizer(config: &NerConfig) -> Result<Box<dyn EntityRecognizer>> {
    match config.backend {
        NerBackend::Rules => Ok(Box::new(RuleBasedNer::with_gazetteers(
            config.gazetteer_paths.as_slice(),
        )?)),
        NerBackend::Remote => Ok(Box::new(RemoteNer::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use geoner_core::{GeoPoint, GeonerError, RecognizedEntity};
    use std::collections::HashMap;

    /// Recognizer returning fixed spans, located by their text
    struct FixedRecognizer {
        spans: Vec<(&'static str, EntityLabel)>,
    }

    #[async_trait]
    impl EntityRecognizer for FixedRecognizer {
        async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>> {
            let mut entities: Vec<RecognizedEntity> = self
                .spans
                .iter()
                .filter_map(|(needle, label)| {
                    let start = text.find(needle)?;
                    Some(RecognizedEntity::from_span(
                        text,
                        start,
                        start + needle.len(),
                        label.clone(),
                    ))
                })
                .collect();
            entities.sort_by_key(|e| e.start);
            Ok(entities)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Geocoder answering from a map; "Error" fails
    struct MapGeocoder {
        places: HashMap<&'static str, GeoPoint>,
    }

    #[async_trait]
    impl Geocoder for MapGeocoder {
        async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
            if address == "Errorville" {
                return Err(GeonerError::GeocodeError("timeout".to_string()));
            }
            Ok(self.places.get(address).copied())
        }

        fn name(&self) -> &str {
            "map"
        }
    }

    fn extractor(spans: Vec<(&'static str, EntityLabel)>) -> SpatialEntityExtractor {
        let geocoder = MapGeocoder {
            places: HashMap::from([
                ("Baghdad", GeoPoint::new(44.4, 33.3)),
                ("Basra", GeoPoint::new(47.8, 30.5)),
            ]),
        };
        SpatialEntityExtractor::new(Box::new(FixedRecognizer { spans }), Box::new(geocoder))
    }

    #[tokio::test]
    async fn test_single_spatial_record() {
        let extractor = extractor(vec![("Baghdad", EntityLabel::Gpe)]);
        let extraction = extractor
            .extract("report.txt", "Baghdad Is A City.")
            .await
            .unwrap();

        let spatial: Vec<&EntityRecord> = extraction.spatial().collect();
        assert_eq!(spatial.len(), 1);
        assert_eq!(spatial[0].lon(), Some(44.4));
        assert_eq!(spatial[0].lat(), Some(33.3));
        assert_eq!(spatial[0].document, "report.txt");
        assert_eq!(spatial[0].post_text, " Is A City.");
    }

    #[tokio::test]
    async fn test_cardinal_entities_excluded() {
        let extractor = extractor(vec![
            ("40", EntityLabel::Cardinal),
            ("Basra", EntityLabel::Gpe),
            ("Monday", EntityLabel::Date),
        ]);
        let extraction = extractor
            .extract("a.txt", "40 tanks reached Basra on Monday.")
            .await
            .unwrap();

        assert!(extraction
            .records
            .iter()
            .all(|r| r.entity_type != EntityLabel::Cardinal));
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.stats.excluded, 1);
        assert_eq!(extraction.stats.non_spatial, 1);
        assert!(!extraction.records[1].spatial_entity());
    }

    #[tokio::test]
    async fn test_unresolved_places_dropped() {
        let extractor = extractor(vec![
            ("Atlantis", EntityLabel::Gpe),
            ("Errorville", EntityLabel::Gpe),
            ("Baghdad", EntityLabel::Gpe),
        ]);
        let extraction = extractor
            .extract("a.txt", "Atlantis, Errorville and Baghdad.")
            .await
            .unwrap();

        let names: Vec<&str> = extraction.records.iter().map(|r| r.entity.as_str()).collect();
        assert_eq!(names, vec!["Baghdad"]);
        assert_eq!(extraction.stats.not_found, 1);
        assert_eq!(extraction.stats.geocode_errors, 1);
        assert_eq!(extraction.stats.records(), 1);
    }

    #[tokio::test]
    async fn test_custom_exclusions_and_width() {
        let extractor = extractor(vec![
            ("40", EntityLabel::Cardinal),
            ("Monday", EntityLabel::Date),
        ])
        .with_excluded_labels(["date"])
        .with_context_width(3);

        let extraction = extractor
            .extract("a.txt", "At 40 on Monday.")
            .await
            .unwrap();

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].entity_type, EntityLabel::Cardinal);
        assert_eq!(extraction.records[0].pre_text, "At ");
        assert_eq!(extraction.records[0].post_text, " on");
    }

    #[tokio::test]
    async fn test_rule_based_extraction_end_to_end() {
        let extractor = SpatialEntityExtractor::new(
            Box::new(RuleBasedNer::new()),
            Box::new(MapGeocoder {
                places: HashMap::from([("Baghdad", GeoPoint::new(44.4, 33.3))]),
            }),
        );

        let extraction = extractor
            .extract("a.txt", "Baghdad Is A City.")
            .await
            .unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert!(extraction.records[0].spatial_entity());
        assert_eq!(extractor.recognizer_name(), "rules");
        assert_eq!(extractor.geocoder_name(), "map");
    }

    #[test]
    fn test_stats_merge() {
        let mut total = ExtractionStats::default();
        let pass = ExtractionStats {
            recognized: 5,
            excluded: 1,
            non_spatial: 2,
            geocoded: 1,
            not_found: 1,
            geocode_errors: 0,
        };
        total.merge(&pass);
        total.merge(&pass);

        assert_eq!(total.recognized, 10);
        assert_eq!(total.records(), 6);
    }

    #[test]
    fn test_create_recognizer() {
        let ner = create_recognizer(&NerConfig::default()).unwrap();
        assert_eq!(ner.name(), "rules");

        let config = NerConfig {
            backend: NerBackend::Remote,
            ..Default::default()
        };
        assert!(create_recognizer(&config).is_err());
    }
}
