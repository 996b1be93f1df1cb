//! Entity reports
//!
//! Groups merged spans by label with mention counts, and checks code-like
//! entities against their expected format.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use spanfuse_core::{Document, Span};

use crate::{CodeCatalog, CodeFormatValidator};

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "--------------------------------------------------";

// ============================================================================
// Entity report
// ============================================================================

/// Distinct mention of an entity and how often it occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub text: String,
    pub count: usize,
}

/// Entities grouped by label, split into standard and custom sections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityReport {
    pub title: Option<String>,
    pub standard: BTreeMap<String, Vec<Mention>>,
    pub custom: BTreeMap<String, Vec<Mention>>,
    /// Custom labels in display order
    pub custom_order: Vec<String>,
}

impl EntityReport {
    /// Group `spans` over `document`; labels in `custom_labels` go to the custom section
    pub fn from_spans(document: &Document, spans: &[Span], custom_labels: &[String]) -> Self {
        let mut grouped: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for span in spans {
            let text = document.span_text(span);
            if text.is_empty() {
                continue;
            }
            *grouped
                .entry(span.label.clone())
                .or_default()
                .entry(text.to_string())
                .or_insert(0) += 1;
        }

        let mut report = Self {
            custom_order: custom_labels.to_vec(),
            ..Self::default()
        };

        for (label, counts) in grouped {
            let mut mentions: Vec<Mention> = counts
                .into_iter()
                .map(|(text, count)| Mention { text, count })
                .collect();
            // Most mentioned first, then alphabetical
            mentions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.text.cmp(&b.text)));

            if custom_labels.contains(&label) {
                report.custom.insert(label, mentions);
            } else {
                report.standard.insert(label, mentions);
            }
        }

        report
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn sections(&self) -> impl Iterator<Item = &Vec<Mention>> {
        self.standard.values().chain(self.custom.values())
    }

    /// Total number of mentions across labels
    pub fn total_mentions(&self) -> usize {
        self.sections().flatten().map(|m| m.count).sum()
    }

    /// Number of distinct (label, text) entities
    pub fn unique_entities(&self) -> usize {
        self.sections().map(Vec::len).sum()
    }

    /// Number of labels present
    pub fn entity_types(&self) -> usize {
        self.standard.len() + self.custom.len()
    }

    /// Mentions under the custom labels
    pub fn custom_mentions(&self) -> usize {
        self.custom.values().flatten().map(|m| m.count).sum()
    }
}

fn write_mentions(f: &mut fmt::Formatter<'_>, mentions: &[Mention], bullet: &str) -> fmt::Result {
    for mention in mentions {
        if mention.count == 1 {
            writeln!(f, "   {} {}", bullet, mention.text)?;
        } else {
            writeln!(
                f,
                "   {} {} (mentioned {} times)",
                bullet, mention.text, mention.count
            )?;
        }
    }
    Ok(())
}

impl fmt::Display for EntityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "ENTITY ANALYSIS")?;
        if let Some(title) = &self.title {
            writeln!(f, "Article: {title}")?;
        }
        writeln!(f, "{RULE}")?;

        if !self.standard.is_empty() {
            writeln!(f, "\nSTANDARD ENTITIES:")?;
            writeln!(f, "{THIN_RULE}")?;
            for (label, mentions) in &self.standard {
                writeln!(f, "\n{label}:")?;
                write_mentions(f, mentions, "•")?;
            }
        }

        if !self.custom.is_empty() {
            writeln!(f, "\nCUSTOM ENTITIES:")?;
            writeln!(f, "{THIN_RULE}")?;
            for label in &self.custom_order {
                if let Some(mentions) = self.custom.get(label) {
                    writeln!(f, "\n{label}:")?;
                    write_mentions(f, mentions, "*")?;
                }
            }
        }

        writeln!(f, "\nSUMMARY:")?;
        writeln!(f, "   • Total entity mentions: {}", self.total_mentions())?;
        writeln!(f, "   • Unique entities found: {}", self.unique_entities())?;
        writeln!(f, "   • Entity types found: {}", self.entity_types())?;
        if self.custom_mentions() > 0 {
            writeln!(f, "   * Custom entities detected: {}", self.custom_mentions())?;
        }
        Ok(())
    }
}

// ============================================================================
// Validation report
// ============================================================================

/// One detected entity with its format check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedEntity {
    pub text: String,
    pub label: String,
    pub valid: bool,
    pub description: Option<String>,
}

/// Format-check results for every detected entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub entities: Vec<ValidatedEntity>,
}

impl ValidationSummary {
    /// Validate each span's text, attaching catalog descriptions for known codes
    pub fn build(
        document: &Document,
        spans: &[Span],
        validator: &CodeFormatValidator,
        catalog: &CodeCatalog,
    ) -> Self {
        let entities = spans
            .iter()
            .map(|span| {
                let text = document.span_text(span).to_string();
                ValidatedEntity {
                    valid: validator.validate(&text, &span.label),
                    description: catalog.describe(&span.label, &text).map(String::from),
                    label: span.label.clone(),
                    text,
                }
            })
            .collect();
        Self { entities }
    }

    /// Accumulate another summary (e.g. the next test sentence)
    pub fn absorb(&mut self, other: ValidationSummary) {
        self.entities.extend(other.entities);
    }

    pub fn total(&self) -> usize {
        self.entities.len()
    }

    pub fn valid(&self) -> usize {
        self.entities.iter().filter(|e| e.valid).count()
    }

    /// Percentage of valid entities, `None` when nothing was detected
    pub fn accuracy(&self) -> Option<f32> {
        if self.entities.is_empty() {
            None
        } else {
            Some(self.valid() as f32 / self.total() as f32 * 100.0)
        }
    }
}

impl fmt::Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entity in &self.entities {
            let mark = if entity.valid { "valid  " } else { "INVALID" };
            match &entity.description {
                Some(description) => writeln!(
                    f,
                    "   [{mark}] {}: '{}' ({description})",
                    entity.label, entity.text
                )?,
                None => writeln!(f, "   [{mark}] {}: '{}'", entity.label, entity.text)?,
            }
        }
        writeln!(f, "\nVALIDATION SUMMARY:")?;
        writeln!(f, "   Total entities detected: {}", self.total())?;
        writeln!(f, "   Valid entities: {}", self.valid())?;
        if let Some(accuracy) = self.accuracy() {
            writeln!(f, "   Validation accuracy: {accuracy:.1}%")?;
        }
        Ok(())
    }
}
