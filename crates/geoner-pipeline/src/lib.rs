//! GeoNER Pipeline - Directory to feature class orchestration
//!
//! Walks the input directory, reads each document, extracts and geocodes
//! entities, and hands located rows to the configured sink. Documents are
//! processed one at a time, in name order.
//!
//! Author: hephaex@gmail.com

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use geoner_core::{
    AppConfig, CaseMode, EntityRecognizer, Geocoder, LocationRecord, Result,
};
use geoner_extractor::{create_recognizer, ExtractionStats, SpatialEntityExtractor};
use geoner_geocode::create_geocoder;
use geoner_parser::{DocumentParser, PlainTextParser};
use geoner_store::{create_sink, validate_output, FeatureSink, SinkSummary};

pub mod walker;

pub use walker::DirectoryWalker;

// ============================================================================
// Run Report
// ============================================================================

/// Outcome of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Files found in the input directory
    pub files_seen: usize,
    /// Files read and run through extraction
    pub files_processed: usize,
    /// Files skipped because they could not be read
    pub files_skipped: usize,
    /// Entity records produced (spatial and non-spatial)
    pub entities: usize,
    /// Records that carry coordinates
    pub spatial_entities: usize,
    /// Rows accepted by the sink
    pub locations_written: usize,
    /// Extraction counters summed over all files
    pub stats: ExtractionStats,
    /// What the sink wrote
    pub output: Option<SinkSummary>,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl RunReport {
    fn new() -> Self {
        Self {
            files_seen: 0,
            files_processed: 0,
            files_skipped: 0,
            entities: 0,
            spatial_entities: 0,
            locations_written: 0,
            stats: ExtractionStats::default(),
            output: None,
            elapsed: Duration::ZERO,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Files: {} seen, {} processed, {} skipped",
            self.files_seen, self.files_processed, self.files_skipped
        )?;
        writeln!(
            f,
            "Entities: {} ({} spatial, {} excluded, {} not found, {} geocode errors)",
            self.entities,
            self.spatial_entities,
            self.stats.excluded,
            self.stats.not_found,
            self.stats.geocode_errors
        )?;
        if let Some(output) = &self.output {
            match &output.location {
                Some(path) => writeln!(
                    f,
                    "Output: {} rows to {} ({})",
                    output.records,
                    path.display(),
                    output.sink
                )?,
                None => writeln!(f, "Output: {} rows ({})", output.records, output.sink)?,
            }
        }
        write!(f, "Elapsed: {:.2}s", self.elapsed.as_secs_f64())
    }
}

/// Per-file result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Processed {
        entities: usize,
        spatial: usize,
        written: usize,
    },
    Skipped,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Sequential directory pipeline
pub struct Pipeline {
    walker: DirectoryWalker,
    case_mode: CaseMode,
    parser: PlainTextParser,
    extractor: SpatialEntityExtractor,
    sink: Box<dyn FeatureSink>,
    stats: ExtractionStats,
}

impl Pipeline {
    /// Assemble a pipeline from its parts
    pub fn new(
        config: &AppConfig,
        recognizer: Box<dyn EntityRecognizer>,
        geocoder: Box<dyn Geocoder>,
        sink: Box<dyn FeatureSink>,
    ) -> Self {
        let extractor = SpatialEntityExtractor::new(recognizer, geocoder)
            .with_excluded_labels(&config.ner.excluded_labels)
            .with_context_width(config.output.context_width);

        Self {
            walker: DirectoryWalker::new(&config.input.directory)
                .with_extensions(&config.input.extensions),
            case_mode: config.input.case_mode,
            parser: PlainTextParser,
            extractor,
            sink,
            stats: ExtractionStats::default(),
        }
    }

    /// Build every component from config
    ///
    /// The output target is checked first but opened last: opening a
    /// GeoPackage rebuilds its layer, which must not happen when another
    /// component fails to start.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        validate_output(&config.output)?;

        let recognizer = create_recognizer(&config.ner)?;
        let geocoder = create_geocoder(&config.geocoder)?;
        let sink = create_sink(&config.output).await?;

        tracing::info!(
            "Pipeline ready: ner={}, geocoder={}, output={}",
            recognizer.name(),
            geocoder.name(),
            sink.name()
        );

        Ok(Self::new(config, recognizer, geocoder, sink))
    }

    pub fn walker(&self) -> &DirectoryWalker {
        &self.walker
    }

    /// Extraction counters accumulated so far
    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Read, extract and write one document
    ///
    /// Unreadable files are skipped with a warning. Recognizer and sink
    /// failures are returned.
    pub async fn process_file(&mut self, path: &Path) -> Result<FileOutcome> {
        let document = match self.parser.parse(path) {
            Ok(document) => document.normalize(self.case_mode),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                return Ok(FileOutcome::Skipped);
            }
        };

        let extraction = self
            .extractor
            .extract(&document.name, &document.content)
            .await?;
        self.stats.merge(&extraction.stats);

        let locations: Vec<LocationRecord> = extraction
            .records
            .iter()
            .filter_map(LocationRecord::from_entity)
            .collect();

        let written = if locations.is_empty() {
            0
        } else {
            self.sink.insert(&locations).await?
        };

        Ok(FileOutcome::Processed {
            entities: extraction.records.len(),
            spatial: locations.len(),
            written,
        })
    }

    /// Process every document in the input directory and close the sink
    pub async fn run(&mut self) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::new();

        let files = self.walker.list()?;
        report.files_seen = files.len();
        tracing::info!(
            "Found {} documents in {}",
            files.len(),
            self.walker.root().display()
        );

        for path in &files {
            match self.process_file(path).await? {
                FileOutcome::Processed {
                    entities,
                    spatial,
                    written,
                } => {
                    report.files_processed += 1;
                    report.entities += entities;
                    report.spatial_entities += spatial;
                    report.locations_written += written;
                }
                FileOutcome::Skipped => report.files_skipped += 1,
            }
        }

        report.output = Some(self.sink.finish().await?);
        report.stats = self.stats;
        report.elapsed = started.elapsed();

        tracing::info!(
            "Run complete: {} files, {} locations written in {:.2}s",
            report.files_processed,
            report.locations_written,
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================
