//! spanfuse Extractor - Span reconciliation pipeline
//!
//! Combines a statistical annotator's entity spans with spans proposed by a
//! rule-based pattern matcher, validates code-like entities, and reports
//! the merged annotation.

use spanfuse_core::{Document, Result, Span};

/// Capability that attaches entity spans to a document.
///
/// Implementations must return mutually non-overlapping spans tagged
/// [`spanfuse_core::SpanSource::Model`].
pub trait Annotator: Send + Sync {
    fn annotate(&self, document: &Document) -> Result<Vec<Span>>;
}

/// Capability that proposes candidate spans from fixed rules.
///
/// Returned spans may overlap each other and the annotator's output.
pub trait SpanMatcher: Send + Sync {
    fn find_spans(&self, document: &Document) -> Result<Vec<Span>>;
}

pub mod codes;
pub mod gazetteer;
pub mod matcher;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod tokenizer;
pub mod training;
pub mod validator;

pub use codes::CodeCatalog;
pub use gazetteer::{GazetteerAnnotator, ModelMetadata};
pub use matcher::PatternMatcher;
pub use merge::{merge, DropReason, DroppedSpan, MergeOutcome, SpanMergeResolver};
pub use pipeline::{AnnotatedDocument, HybridPipeline};
pub use tokenizer::Tokenizer;
pub use training::{EntityAnnotation, TrainingExample, TrainingSet};
pub use validator::CodeFormatValidator;
