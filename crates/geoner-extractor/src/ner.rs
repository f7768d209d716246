//! Rule-based Named Entity Recognition
//!
//! Offline recognizer combining:
//! - Regex patterns for numeric and temporal categories
//! - Honorific and suffix heuristics for people and organizations
//! - A gazetteer dictionary of known place, group, and organization names

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use regex::Regex;

use geoner_core::{EntityLabel, EntityRecognizer, GeonerError, RecognizedEntity, Result};

/// Gazetteer shipped with the crate
const BUILTIN_GAZETTEER: &str = include_str!("../data/gazetteer.tsv");

/// Dictionary matches win over pattern matches on overlap
const DICTIONARY_PRIORITY: u8 = 3;

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

// ============================================================================
// Rule-based NER
// ============================================================================

/// A regex rule producing one label
struct PatternRule {
    regex: Regex,
    label: EntityLabel,
    priority: u8,
}

/// Candidate span before overlap resolution
struct Candidate {
    start: usize,
    end: usize,
    label: EntityLabel,
    priority: u8,
}

/// Rule-based NER using regex patterns and a gazetteer
pub struct RuleBasedNer {
    /// Pattern rules (regex -> label)
    patterns: Vec<PatternRule>,
    /// Alternation of all dictionary terms, longest first
    dictionary: Option<Regex>,
    /// Lookup index (normalised term -> label)
    lookup: HashMap<String, EntityLabel>,
}

impl RuleBasedNer {
    /// Create a recognizer with the default patterns and built-in gazetteer
    pub fn new() -> Self {
        let mut ner = Self {
            patterns: Vec::new(),
            dictionary: None,
            lookup: HashMap::new(),
        };

        ner.init_patterns();
        // The built-in table is validated by tests
        if let Err(e) = ner.load_terms(BUILTIN_GAZETTEER) {
            tracing::error!("Built-in gazetteer rejected: {}", e);
        }
        ner.rebuild_dictionary();
        ner
    }

    /// Create a recognizer with additional gazetteer files
    ///
    /// Entries in later files override earlier ones for the same term.
    pub fn with_gazetteers(paths: &[impl AsRef<Path>]) -> Result<Self> {
        let mut ner = Self::new();

        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|e| {
                GeonerError::RecognitionError(format!(
                    "Failed to read gazetteer {}: {e}",
                    path.display()
                ))
            })?;
            let added = ner.load_terms(&content)?;
            tracing::info!("Loaded {} gazetteer terms from {}", added, path.display());
        }

        ner.rebuild_dictionary();
        Ok(ner)
    }

    /// Initialize regex patterns
    fn init_patterns(&mut self) {
        // Money
        self.add_pattern(
            r"(?i)\$\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:thousand|million|billion|trillion))?",
            EntityLabel::Money,
            2,
        );
        self.add_pattern(
            r"(?i)\b\d[\d,]*(?:\.\d+)?\s?(?:million\s|billion\s)?(?:dollars|dinars|riyals|euros|pounds sterling)\b",
            EntityLabel::Money,
            2,
        );

        // Percent
        self.add_pattern(
            r"(?i)\b\d+(?:\.\d+)?(?:\s?%|\s?percent\b)",
            EntityLabel::Percent,
            2,
        );

        // Dates
        self.add_pattern(r"\b\d{4}-\d{2}-\d{2}\b", EntityLabel::Date, 2);
        self.add_pattern(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b", EntityLabel::Date, 2);
        self.add_pattern(
            &format!(r"(?i)\b(?:{MONTHS})\.?\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?\b"),
            EntityLabel::Date,
            2,
        );
        self.add_pattern(
            &format!(r"(?i)\b\d{{1,2}}\s+(?:{MONTHS})\.?(?:\s+\d{{4}})?\b"),
            EntityLabel::Date,
            2,
        );
        self.add_pattern(
            &format!(r"(?i)\b(?:{MONTHS})\.?\s+\d{{4}}\b"),
            EntityLabel::Date,
            2,
        );
        self.add_pattern(r"\b(?:1[89]|20)\d{2}s?\b", EntityLabel::Date, 2);

        // Time
        self.add_pattern(
            r"(?i)\b\d{1,2}:\d{2}(?:\s?(?:am|pm|a\.m\.|p\.m\.))?",
            EntityLabel::Time,
            2,
        );
        self.add_pattern(
            r"(?i)\b\d{4}\s?(?:hours|hrs|z|zulu)\b",
            EntityLabel::Time,
            2,
        );

        // Quantity
        self.add_pattern(
            r"(?i)\b\d[\d,]*(?:\.\d+)?\s?(?:km|kilometers?|kilometres?|miles?|meters?|metres?|kg|kilograms?|tons?|tonnes?|pounds|lbs|feet|ft|barrels)\b",
            EntityLabel::Quantity,
            2,
        );

        // Ordinals
        self.add_pattern(r"(?i)\b\d+(?:st|nd|rd|th)\b", EntityLabel::Ordinal, 2);
        self.add_pattern(
            r"(?i)\b(?:first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth)\b",
            EntityLabel::Ordinal,
            2,
        );

        // Cardinals
        self.add_pattern(r"\b\d[\d,]*(?:\.\d+)?\b", EntityLabel::Cardinal, 1);
        self.add_pattern(
            r"(?i)\b(?:one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|dozens?|hundreds?|thousands?|millions?)\b",
            EntityLabel::Cardinal,
            1,
        );

        // People after an honorific or rank; the name is capture group 1
        self.add_pattern(
            r"\b(?:Mr|Mrs|Ms|Dr|Gen|General|Col|Colonel|Maj|Major|Capt|Captain|Lt|Sgt|President|Minister|Sheikh|Shaykh|King|Prince|Ayatollah)\.?\s+([A-Z][a-z]+(?:[\s-]+(?:al-)?[A-Z][a-z]+){0,2})",
            EntityLabel::Person,
            2,
        );

        // Organizations by suffix
        self.add_pattern(
            r"\b(?:[A-Z][A-Za-z]+\s+){1,4}(?:Ministry|Army|Corps|Brigade|Division|Battalion|Regiment|Party|Council|Agency|Organization|Company|Corporation|Bank|University|Command|Guard|Committee|Front)(?:\s+of\s+(?:the\s+)?[A-Z][A-Za-z]+)?\b",
            EntityLabel::Organization,
            2,
        );
        self.add_pattern(
            r"\bMinistry\s+of\s+(?:the\s+)?[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)?\b",
            EntityLabel::Organization,
            2,
        );
    }

    /// Add a regex pattern
    fn add_pattern(&mut self, pattern: &str, label: EntityLabel, priority: u8) {
        match Regex::new(pattern) {
            Ok(regex) => self.patterns.push(PatternRule {
                regex,
                label,
                priority,
            }),
            Err(e) => tracing::warn!("Skipping invalid {} pattern: {}", label, e),
        }
    }

    /// Add a dictionary term (call `rebuild_dictionary` afterwards)
    fn add_term(&mut self, term: &str, label: EntityLabel) {
        let key = normalize_term(term);
        if !key.is_empty() {
            self.lookup.insert(key, label);
        }
    }

    /// Parse `LABEL<TAB>term` lines into the lookup table
    fn load_terms(&mut self, content: &str) -> Result<usize> {
        let mut added = 0;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let (label, term) = line.split_once('\t').ok_or_else(|| {
                GeonerError::RecognitionError(format!(
                    "Gazetteer line {}: expected LABEL<TAB>term",
                    line_no + 1
                ))
            })?;

            self.add_term(term, EntityLabel::parse(label));
            added += 1;
        }

        Ok(added)
    }

    /// Compile the dictionary alternation from the lookup table
    fn rebuild_dictionary(&mut self) {
        let mut terms: Vec<&String> = self.lookup.keys().collect();
        // Longest first so "New York City" beats "New York" at the same start
        terms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let alternatives: Vec<String> = terms
            .iter()
            .map(|term| {
                let body = term
                    .split(' ')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+");
                if term.ends_with(|c: char| c.is_alphanumeric()) {
                    format!(r"{body}\b")
                } else {
                    body
                }
            })
            .collect();

        if alternatives.is_empty() {
            self.dictionary = None;
            return;
        }

        let pattern = format!(r"(?i)\b(?:{})", alternatives.join("|"));
        self.dictionary = match Regex::new(&pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::error!("Gazetteer dictionary failed to compile: {}", e);
                None
            }
        };
    }

    /// Number of dictionary terms
    pub fn term_count(&self) -> usize {
        self.lookup.len()
    }

    /// Extract candidates using pattern matching
    fn extract_by_patterns(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for rule in &self.patterns {
            for caps in rule.regex.captures_iter(text) {
                let Some(mat) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                candidates.push(Candidate {
                    start: mat.start(),
                    end: mat.end(),
                    label: rule.label.clone(),
                    priority: rule.priority,
                });
            }
        }

        candidates
    }

    /// Extract candidates using dictionary lookup
    ///
    /// Matching ignores case, but a match must start with a capital letter
    /// so lower-case common nouns ("turkey", "china") are not taken as names.
    fn extract_by_dictionary(&self, text: &str) -> Vec<Candidate> {
        let Some(dictionary) = &self.dictionary else {
            return Vec::new();
        };

        dictionary
            .find_iter(text)
            .filter(|mat| is_capitalized(mat.as_str()))
            .filter_map(|mat| {
                let label = self.lookup.get(&normalize_term(mat.as_str()))?;
                Some(Candidate {
                    start: mat.start(),
                    end: mat.end(),
                    label: label.clone(),
                    priority: DICTIONARY_PRIORITY,
                })
            })
            .collect()
    }
}

impl Default for RuleBasedNer {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove overlapping candidates, keeping the highest priority and then the
/// longest span, and return the survivors in document order
fn resolve_overlaps(text: &str, mut candidates: Vec<Candidate>) -> Vec<RecognizedEntity> {
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then((b.end - b.start).cmp(&(a.end - a.start)))
            .then(a.start.cmp(&b.start))
    });

    // Accepted spans keyed by start; they never overlap each other
    let mut accepted: BTreeMap<usize, usize> = BTreeMap::new();
    let mut result = Vec::new();

    for candidate in candidates {
        if candidate.start >= candidate.end {
            continue;
        }
        // Only the last span starting before our end can reach into us
        let overlaps = accepted
            .range(..candidate.end)
            .next_back()
            .is_some_and(|(_, &end)| end > candidate.start);

        if !overlaps {
            accepted.insert(candidate.start, candidate.end);
            result.push(RecognizedEntity::from_span(
                text,
                candidate.start,
                candidate.end,
                candidate.label,
            ));
        }
    }

    result.sort_by_key(|e| e.start);
    result
}

/// True when the first letter of `span` is upper-case
fn is_capitalized(span: &str) -> bool {
    span.chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(char::is_uppercase)
}

/// Lower-case and collapse whitespace
fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl EntityRecognizer for RuleBasedNer {
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>> {
        let mut candidates = self.extract_by_patterns(text);
        candidates.extend(self.extract_by_dictionary(text));

        Ok(resolve_overlaps(text, candidates))
    }

    fn name(&self) -> &str {
        "rules"
    }
}

// ============================================================================
// Tests
// ============================================================================
