//! Quality Metrics module
//!
//! Precision, recall and F1 for predicted spans against gold spans.

use serde::{Deserialize, Serialize};

use spanfuse_core::{Result, Span};

use crate::training::TrainingSet;
use crate::{Annotator, Tokenizer};

/// Span-level confusion counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetrics {
    /// Predicted spans matched to a gold span
    pub true_positives: usize,
    /// Predicted spans with no gold counterpart
    pub false_positives: usize,
    /// Gold spans no prediction matched
    pub false_negatives: usize,
    pub gold_total: usize,
    pub predicted_total: usize,
}

impl EntityMetrics {
    /// Share of predicted spans that matched; 0 when nothing was predicted
    pub fn precision(&self) -> f32 {
        if self.true_positives + self.false_positives == 0 {
            0.0
        } else {
            self.true_positives as f32 / (self.true_positives + self.false_positives) as f32
        }
    }

    /// Share of gold spans that were found
    pub fn recall(&self) -> f32 {
        if self.true_positives + self.false_negatives == 0 {
            0.0
        } else {
            self.true_positives as f32 / (self.true_positives + self.false_negatives) as f32
        }
    }

    /// Harmonic mean of precision and recall
    pub fn f1_score(&self) -> f32 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Fold one document's counts into a running total
    pub fn accumulate(&mut self, other: &EntityMetrics) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self.gold_total += other.gold_total;
        self.predicted_total += other.predicted_total;
    }
}

/// Scores an annotator's spans against gold annotations
pub struct Evaluator {
    /// Require identical offsets instead of any overlap
    strict: bool,
    /// Require identical labels
    match_types: bool,
}

impl Evaluator {
    /// Overlap matching with labels compared
    pub fn new() -> Self {
        Self {
            strict: false,
            match_types: true,
        }
    }

    /// Only exact `(start, end)` matches count
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Whether labels must agree for a match
    pub fn with_type_matching(mut self, match_types: bool) -> Self {
        self.match_types = match_types;
        self
    }

    fn spans_match(&self, predicted: &Span, gold: &Span) -> bool {
        if self.match_types && predicted.label != gold.label {
            return false;
        }
        if self.strict {
            predicted.start == gold.start && predicted.end == gold.end
        } else {
            predicted.overlaps(gold)
        }
    }

    /// Compare predicted spans with gold spans; each gold span matches at most once
    pub fn evaluate(&self, gold: &[Span], predicted: &[Span]) -> EntityMetrics {
        let mut matched_gold = vec![false; gold.len()];
        let mut true_positives = 0;

        for p in predicted {
            let hit = gold
                .iter()
                .enumerate()
                .find(|(i, g)| !matched_gold[*i] && self.spans_match(p, g));
            if let Some((i, _)) = hit {
                matched_gold[i] = true;
                true_positives += 1;
            }
        }

        EntityMetrics {
            true_positives,
            false_positives: predicted.len() - true_positives,
            false_negatives: gold.len() - true_positives,
            gold_total: gold.len(),
            predicted_total: predicted.len(),
        }
    }

    /// Run `annotator` over every example and compare with its annotations.
    ///
    /// Annotations that do not align to token boundaries are left out of
    /// the gold set.
    pub fn evaluate_set(&self, annotator: &dyn Annotator, set: &TrainingSet) -> Result<EntityMetrics> {
        let tokenizer = Tokenizer::new();
        let mut total = EntityMetrics::default();

        for example in &set.examples {
            let doc = tokenizer.tokenize(&example.text);
            let gold: Vec<Span> = example
                .entities
                .iter()
                .filter_map(|e| {
                    doc.char_span(e.start, e.end)
                        .map(|(start, end)| Span::model(start, end, e.label.as_str()))
                })
                .collect();
            let predicted = annotator.annotate(&doc)?;
            total.accumulate(&self.evaluate(&gold, &predicted));
        }

        Ok(total)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GazetteerAnnotator;

    #[test]
    fn test_metrics_calculation() {
        let metrics = EntityMetrics {
            true_positives: 8,
            false_positives: 2,
            false_negatives: 2,
            gold_total: 10,
            predicted_total: 10,
        };

        assert!((metrics.precision() - 0.8).abs() < 0.001);
        assert!((metrics.recall() - 0.8).abs() < 0.001);
        assert!((metrics.f1_score() - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = EntityMetrics::default();
        assert_eq!(metrics.precision(), 0.0);
        assert_eq!(metrics.recall(), 0.0);
        assert_eq!(metrics.f1_score(), 0.0);
    }

    #[test]
    fn test_strict_vs_overlap_matching() {
        let gold = vec![Span::model(0, 3, "SCHOOL")];
        let predicted = vec![Span::model(0, 2, "SCHOOL")];

        let lenient = Evaluator::new().evaluate(&gold, &predicted);
        assert_eq!(lenient.true_positives, 1);

        let strict = Evaluator::new().strict().evaluate(&gold, &predicted);
        assert_eq!(strict.true_positives, 0);
        assert_eq!(strict.false_positives, 1);
        assert_eq!(strict.false_negatives, 1);
    }

    #[test]
    fn test_type_matching() {
        let gold = vec![Span::model(4, 5, "SPORTS_TEAM")];
        let predicted = vec![Span::model(4, 5, "SCHOOL")];

        assert_eq!(Evaluator::new().evaluate(&gold, &predicted).true_positives, 0);
        assert_eq!(
            Evaluator::new()
                .with_type_matching(false)
                .evaluate(&gold, &predicted)
                .true_positives,
            1
        );
    }

    #[test]
    fn test_gold_matched_once() {
        let gold = vec![Span::model(0, 4, "COURSE")];
        let predicted = vec![Span::model(0, 2, "COURSE"), Span::model(2, 4, "COURSE")];
        let metrics = Evaluator::new().evaluate(&gold, &predicted);
        assert_eq!(metrics.true_positives, 1);
        assert_eq!(metrics.false_positives, 1);
    }

    #[test]
    fn test_evaluate_training_set() {
        let set = TrainingSet::custom_entities().unwrap();
        let annotator = GazetteerAnnotator::from_training(&set);
        let metrics = Evaluator::new().strict().evaluate_set(&annotator, &set).unwrap();

        assert_eq!(metrics.gold_total, set.entity_count());
        assert!(metrics.recall() > 0.9);
    }
}
