//! Hybrid pipeline
//!
//! Tokenize, run the annotator and the rule matcher over the same
//! document, then merge the two span sets.

use spanfuse_core::{Document, Result, Span};

use crate::merge::{DroppedSpan, SpanMergeResolver};
use crate::{Annotator, SpanMatcher, Tokenizer};

/// A document with its final entity annotation
#[derive(Debug, Clone)]
pub struct AnnotatedDocument {
    pub document: Document,
    pub spans: Vec<Span>,
    /// Rule candidates the resolver discarded
    pub dropped: Vec<DroppedSpan>,
}

impl AnnotatedDocument {
    /// `(text, label)` for each merged span
    pub fn entities(&self) -> Vec<(&str, &str)> {
        self.spans
            .iter()
            .map(|s| (self.document.span_text(s), s.label.as_str()))
            .collect()
    }
}

/// Annotator + rule matcher + resolver
pub struct HybridPipeline {
    tokenizer: Tokenizer,
    annotator: Box<dyn Annotator>,
    matcher: Box<dyn SpanMatcher>,
    resolver: SpanMergeResolver,
}

impl HybridPipeline {
    pub fn new(annotator: Box<dyn Annotator>, matcher: Box<dyn SpanMatcher>) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            annotator,
            matcher,
            resolver: SpanMergeResolver::new(),
        }
    }

    /// Use a configured resolver
    pub fn with_resolver(mut self, resolver: SpanMergeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Run the pipeline over raw text
    pub fn run(&self, text: &str) -> Result<AnnotatedDocument> {
        self.run_document(self.tokenizer.tokenize(text))
    }

    /// Run the pipeline over an already tokenized document
    pub fn run_document(&self, document: Document) -> Result<AnnotatedDocument> {
        let existing = self.annotator.annotate(&document)?;
        let candidates = self.matcher.find_spans(&document)?;
        tracing::debug!(
            "Annotator produced {} spans, matcher proposed {}",
            existing.len(),
            candidates.len()
        );

        let outcome = self.resolver.merge_detailed(&existing, &candidates)?;
        Ok(AnnotatedDocument {
            document,
            spans: outcome.spans,
            dropped: outcome.dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GazetteerAnnotator, PatternMatcher};

    /// Returns fixed spans regardless of the document
    struct FixedSpans(Vec<Span>);

    impl Annotator for FixedSpans {
        fn annotate(&self, _document: &Document) -> Result<Vec<Span>> {
            Ok(self.0.clone())
        }
    }

    impl SpanMatcher for FixedSpans {
        fn find_spans(&self, _document: &Document) -> Result<Vec<Span>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_stub_annotator_and_matcher() {
        let pipeline = HybridPipeline::new(
            Box::new(FixedSpans(vec![Span::model(5, 10, "SCHOOL")])),
            Box::new(FixedSpans(vec![
                Span::rule(7, 12, "EVENT"),
                Span::rule(0, 2, "PRODUCT"),
            ])),
        );
        let result = pipeline.run("a b c d e f g h i j k l").unwrap();

        assert_eq!(
            result.spans,
            vec![Span::rule(0, 2, "PRODUCT"), Span::model(5, 10, "SCHOOL")]
        );
        assert_eq!(result.dropped.len(), 1);
        assert_eq!(result.dropped[0].span, Span::rule(7, 12, "EVENT"));
    }

    #[test]
    fn test_annotator_overrides_rule_match() {
        // "Tesla Model" is already an ORG, so every "Model ..." candidate loses
        let mut annotator = GazetteerAnnotator::new();
        annotator.add_phrase("Tesla Model", "ORG");

        let pipeline = HybridPipeline::new(
            Box::new(annotator),
            Box::new(PatternMatcher::products_and_events()),
        );
        let result = pipeline
            .run("Tesla Model S Plaid joins the Super Bowl.")
            .unwrap();

        assert_eq!(
            result.entities(),
            vec![("Tesla Model", "ORG"), ("Super Bowl", "EVENT")]
        );
        assert!(result
            .dropped
            .iter()
            .any(|d| d.conflicts_with == Span::model(0, 2, "ORG")));
    }

    #[test]
    fn test_products_and_events_article() {
        let annotator = GazetteerAnnotator::new();
        let pipeline = HybridPipeline::new(
            Box::new(annotator),
            Box::new(PatternMatcher::products_and_events()),
        );
        let result = pipeline
            .run("Microsoft unveiled Windows 11 and will attend CES 2024 in Las Vegas.")
            .unwrap();

        let entities = result.entities();
        assert!(entities.contains(&("Windows 11", "PRODUCT")));
        assert!(entities.contains(&("CES 2024", "EVENT")));
        // Same-label expansions are not conflicts
        assert!(entities.contains(&("CES", "EVENT")));
        assert!(result.dropped.is_empty());
    }
}
