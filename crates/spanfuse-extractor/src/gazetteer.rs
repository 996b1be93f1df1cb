//! Dictionary annotator
//!
//! Memorises the annotated phrases of a training set and tags later
//! occurrences with a greedy longest-match scan. It stands in for a trained
//! statistical model wherever an [`Annotator`] is needed, and persists as a
//! model directory with a metadata file next to it.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spanfuse_core::{Document, Result, Span, SpanfuseError};

use crate::training::TrainingSet;
use crate::{Annotator, Tokenizer};

const MODEL_FILE: &str = "model.json";
const METADATA_FILE: &str = "metadata.json";

/// Descriptive data saved alongside a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub naics_codes: BTreeMap<String, String>,
    #[serde(default)]
    pub psc_codes: BTreeMap<String, String>,
    /// Label -> human-readable format description
    #[serde(default)]
    pub validation_patterns: BTreeMap<String, String>,
}

impl ModelMetadata {
    pub fn new(model_type: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            model_type: model_type.into(),
            labels,
            created_at: Utc::now(),
            naics_codes: BTreeMap::new(),
            psc_codes: BTreeMap::new(),
            validation_patterns: BTreeMap::new(),
        }
    }
}

/// Serialized form: phrase -> label -> occurrence count
#[derive(Debug, Default, Serialize, Deserialize)]
struct GazetteerModel {
    phrases: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Longest-match phrase annotator
#[derive(Debug, Clone, Default)]
pub struct GazetteerAnnotator {
    tokenizer: Tokenizer,
    /// Lower-cased, space-joined token phrase -> resolved label
    phrases: HashMap<String, String>,
    /// Raw counts kept for persistence
    counts: BTreeMap<String, BTreeMap<String, usize>>,
    /// Longest phrase in tokens
    max_len: usize,
}

impl GazetteerAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn phrases from every annotation in `set`.
    ///
    /// Annotations that do not line up with token boundaries are skipped
    /// with a warning.
    pub fn from_training(set: &TrainingSet) -> Self {
        let mut annotator = Self::new();
        let mut skipped = 0;

        for example in &set.examples {
            let doc = annotator.tokenizer.tokenize(&example.text);
            for entity in &example.entities {
                match doc.char_span(entity.start, entity.end) {
                    Some((start, end)) => {
                        let key = phrase_key(&doc, start, end);
                        annotator.add_phrase_count(key, &entity.label, 1);
                    }
                    None => {
                        skipped += 1;
                        tracing::warn!(
                            "Skipping misaligned {} annotation [{}, {}) in {:?}",
                            entity.label,
                            entity.start,
                            entity.end,
                            example.text
                        );
                    }
                }
            }
        }

        annotator.rebuild_index();
        tracing::info!(
            "Learned {} phrases from {} examples ({} annotations skipped)",
            annotator.len(),
            set.len(),
            skipped
        );
        annotator
    }

    /// Add one phrase by its surface text
    pub fn add_phrase(&mut self, phrase: &str, label: &str) {
        let doc = self.tokenizer.tokenize(phrase);
        if doc.is_empty() {
            return;
        }
        let key = phrase_key(&doc, 0, doc.len());
        self.add_phrase_count(key, label, 1);
        self.rebuild_index();
    }

    fn add_phrase_count(&mut self, key: String, label: &str, count: usize) {
        *self
            .counts
            .entry(key)
            .or_default()
            .entry(label.to_string())
            .or_insert(0) += count;
    }

    /// Resolve each phrase to its most frequent label (alphabetical on ties)
    fn rebuild_index(&mut self) {
        self.phrases = self
            .counts
            .iter()
            .filter_map(|(phrase, labels)| {
                labels
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                    .map(|(label, _)| (phrase.clone(), label.clone()))
            })
            .collect();
        self.max_len = self
            .phrases
            .keys()
            .map(|p| p.split(' ').count())
            .max()
            .unwrap_or(0);
    }

    /// Number of known phrases
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Label a phrase resolves to
    pub fn label_for(&self, phrase: &str) -> Option<&str> {
        let doc = self.tokenizer.tokenize(phrase);
        if doc.is_empty() {
            return None;
        }
        self.phrases
            .get(&phrase_key(&doc, 0, doc.len()))
            .map(String::as_str)
    }

    /// Sorted labels this annotator can produce
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.phrases.values().cloned().collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Write `model.json` and `metadata.json` into `dir`
    pub fn save(&self, dir: impl AsRef<Path>, metadata: &ModelMetadata) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

        let model = GazetteerModel {
            phrases: self.counts.clone(),
        };
        write_json(&dir.join(MODEL_FILE), &model)?;
        write_json(&dir.join(METADATA_FILE), metadata)?;

        tracing::info!("Saved {} phrases to {}", self.len(), dir.display());
        Ok(())
    }

    /// Read a model directory; metadata is optional
    pub fn load(dir: impl AsRef<Path>) -> Result<(Self, Option<ModelMetadata>)> {
        let dir = dir.as_ref();
        let model_path = dir.join(MODEL_FILE);
        let content = std::fs::read_to_string(&model_path).map_err(|e| io_error(&model_path, e))?;
        let model: GazetteerModel = serde_json::from_str(&content)?;

        let mut annotator = Self::new();
        for (phrase, labels) in model.phrases {
            for (label, count) in labels {
                annotator.add_phrase_count(phrase.clone(), &label, count);
            }
        }
        annotator.rebuild_index();

        let metadata_path = dir.join(METADATA_FILE);
        let metadata = if metadata_path.exists() {
            let content =
                std::fs::read_to_string(&metadata_path).map_err(|e| io_error(&metadata_path, e))?;
            Some(serde_json::from_str(&content)?)
        } else {
            tracing::warn!("Model loaded, but {} not found", metadata_path.display());
            None
        };

        Ok((annotator, metadata))
    }
}

impl Annotator for GazetteerAnnotator {
    fn annotate(&self, document: &Document) -> Result<Vec<Span>> {
        let mut spans = Vec::new();
        let n = document.len();
        let mut i = 0;

        while i < n {
            let longest = self.max_len.min(n - i);
            let hit = (1..=longest).rev().find_map(|len| {
                self.phrases
                    .get(&phrase_key(document, i, i + len))
                    .map(|label| (len, label))
            });

            match hit {
                Some((len, label)) => {
                    spans.push(Span::model(i, i + len, label.as_str()));
                    i += len;
                }
                None => i += 1,
            }
        }

        Ok(spans)
    }
}

fn phrase_key(document: &Document, start: usize, end: usize) -> String {
    document.tokens[start..end]
        .iter()
        .map(|t| t.lower())
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> SpanfuseError {
    SpanfuseError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::CodeCatalog;

    fn tagged(annotator: &GazetteerAnnotator, text: &str) -> Vec<(String, String)> {
        let doc = Tokenizer::new().tokenize(text);
        annotator
            .annotate(&doc)
            .unwrap()
            .iter()
            .map(|s| (doc.span_text(s).to_string(), s.label.clone()))
            .collect()
    }

    #[test]
    fn test_learns_custom_entities() {
        let set = TrainingSet::custom_entities().unwrap();
        let annotator = GazetteerAnnotator::from_training(&set);

        let found = tagged(&annotator, "The Eagles won against Lincoln Elementary");
        assert_eq!(
            found,
            vec![
                ("Eagles".to_string(), "SPORTS_TEAM".to_string()),
                ("Lincoln Elementary".to_string(), "SCHOOL".to_string()),
            ]
        );
    }

    #[test]
    fn test_longest_match_wins() {
        let mut annotator = GazetteerAnnotator::new();
        annotator.add_phrase("Roosevelt Middle", "SCHOOL");
        annotator.add_phrase("Roosevelt Middle School Tigers", "SPORTS_TEAM");

        let found = tagged(&annotator, "Go Roosevelt Middle School Tigers!");
        assert_eq!(
            found,
            vec![(
                "Roosevelt Middle School Tigers".to_string(),
                "SPORTS_TEAM".to_string()
            )]
        );
    }

    #[test]
    fn test_output_is_non_overlapping_and_case_insensitive() {
        let set = TrainingSet::custom_entities().unwrap();
        let annotator = GazetteerAnnotator::from_training(&set);
        let doc = Tokenizer::new().tokenize("washington high school and AP BIOLOGY at main street cafe");
        let spans = annotator.annotate(&doc).unwrap();

        assert_eq!(spans.len(), 3);
        assert!(spans.windows(2).all(|w| !w[0].overlaps(&w[1])));
        assert!(spans.iter().all(|s| s.source == spanfuse_core::SpanSource::Model));
    }

    #[test]
    fn test_label_conflict_resolution() {
        let mut annotator = GazetteerAnnotator::new();
        annotator.add_phrase("Lincoln", "SCHOOL");
        annotator.add_phrase("Lincoln", "PERSON");
        assert_eq!(annotator.label_for("lincoln"), Some("PERSON"));

        annotator.add_phrase("Lincoln", "SCHOOL");
        assert_eq!(annotator.label_for("Lincoln"), Some("SCHOOL"));
    }

    #[test]
    fn test_misaligned_annotations_skipped() {
        let mut example = crate::TrainingExample::negative("Washington High School won");
        example.entities.push(crate::EntityAnnotation {
            start: 0,
            end: 21,
            label: "SCHOOL".to_string(),
            description: None,
        });
        let annotator = GazetteerAnnotator::from_training(&TrainingSet::new(vec![example]));
        assert!(annotator.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = CodeCatalog::builtin();
        let set = TrainingSet::naics_psc(&catalog).unwrap();
        let annotator = GazetteerAnnotator::from_training(&set);

        let mut metadata = ModelMetadata::new("NAICS_PSC_Recognition", set.labels());
        metadata.naics_codes = catalog.naics.clone();
        metadata.psc_codes = catalog.psc.clone();
        annotator.save(dir.path(), &metadata).unwrap();

        let (loaded, loaded_metadata) = GazetteerAnnotator::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), annotator.len());
        assert_eq!(loaded.labels(), vec!["NAICS", "PSC"]);
        assert_eq!(loaded_metadata, Some(metadata));

        let found = tagged(&loaded, "Vendor with NAICS 541512 experience seeks PSC 7035 opportunities");
        assert_eq!(
            found,
            vec![
                ("541512".to_string(), "NAICS".to_string()),
                ("7035".to_string(), "PSC".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut annotator = GazetteerAnnotator::new();
        annotator.add_phrase("Burger Barn", "LOCAL_BUSINESS");
        annotator
            .save(dir.path(), &ModelMetadata::new("custom", annotator.labels()))
            .unwrap();
        std::fs::remove_file(dir.path().join(METADATA_FILE)).unwrap();

        let (loaded, metadata) = GazetteerAnnotator::load(dir.path()).unwrap();
        assert!(metadata.is_none());
        assert_eq!(loaded.label_for("burger barn"), Some("LOCAL_BUSINESS"));
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            GazetteerAnnotator::load(dir.path()),
            Err(SpanfuseError::Io { .. })
        ));
    }
}
