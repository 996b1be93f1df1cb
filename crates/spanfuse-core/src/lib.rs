//! spanfuse Core - Span models, errors, and shared configuration
//!
//! This crate defines the core abstractions used throughout spanfuse:
//! - Token and document models
//! - Labeled spans and their ordering/identity rules
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, ConflictPolicy, LoggingConfig, MergeConfig, ReportConfig,
    ValidationConfig,
};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for spanfuse operations
#[derive(Error, Debug)]
pub enum SpanfuseError {
    #[error("Malformed span {label}[{start}, {end}): start must be less than end")]
    MalformedSpan {
        start: usize,
        end: usize,
        label: String,
    },

    #[error("Invalid pattern for {label}: {message}")]
    InvalidPattern { label: String, message: String },

    #[error("Invalid annotation in {text:?}: {message}")]
    InvalidAnnotation { text: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SpanfuseError>;

// ============================================================================
// Tokens and Documents
// ============================================================================

/// A token with its byte offsets in the document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub index: usize,
}

impl Token {
    /// Lower-cased token text
    pub fn lower(&self) -> String {
        self.text.to_lowercase()
    }

    /// True if every character is alphabetic
    pub fn is_alpha(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(char::is_alphabetic)
    }

    /// True if the token has cased characters and all of them are upper case
    pub fn is_upper(&self) -> bool {
        self.text.chars().any(char::is_alphabetic)
            && self
                .text
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(char::is_uppercase)
    }

    /// True for digit strings, optionally with `,` or `.` separators
    pub fn like_num(&self) -> bool {
        let digits = self.text.trim_start_matches(['+', '-']);
        !digits.is_empty()
            && digits.chars().next().is_some_and(|c| c.is_ascii_digit())
            && digits
                .chars()
                .all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A tokenized document
///
/// Spans over a document are expressed in token offsets; tokens carry the
/// byte offsets that map them back into `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub tokens: Vec<Token>,
}

impl Document {
    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Map a byte range to the token range that covers it exactly.
    ///
    /// Returns `None` when `start` or `end` do not fall on token boundaries.
    pub fn char_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end {
            return None;
        }
        let first = self.tokens.iter().position(|t| t.start == start)?;
        let last = self.tokens[first..]
            .iter()
            .position(|t| t.end == end)
            .map(|offset| first + offset)?;
        Some((first, last + 1))
    }

    /// Text covered by a span, empty if the span is out of range
    pub fn span_text(&self, span: &Span) -> &str {
        if span.start >= span.end || span.end > self.tokens.len() {
            return "";
        }
        let from = self.tokens[span.start].start;
        let to = self.tokens[span.end - 1].end;
        &self.text[from..to]
    }
}

// ============================================================================
// Spans
// ============================================================================

/// Which component produced a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanSource {
    /// Statistical annotator output
    Model,
    /// Rule-based pattern matcher output
    Rule,
}

impl std::fmt::Display for SpanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Rule => write!(f, "rule"),
        }
    }
}

/// A labeled half-open token interval `[start, end)`
///
/// Equality, hashing and ordering use `(start, end, label)` only; the
/// source is carried along but never compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub source: SpanSource,
}

impl Span {
    pub fn new(start: usize, end: usize, label: impl Into<String>, source: SpanSource) -> Self {
        Self {
            start,
            end,
            label: label.into(),
            source,
        }
    }

    /// Span produced by the statistical annotator
    pub fn model(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self::new(start, end, label, SpanSource::Model)
    }

    /// Span produced by the rule matcher
    pub fn rule(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self::new(start, end, label, SpanSource::Rule)
    }

    /// Number of tokens covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Half-open interval overlap
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Fails with `MalformedSpan` unless `start < end`
    pub fn check_well_formed(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(SpanfuseError::MalformedSpan {
                start: self.start,
                end: self.end,
                label: self.label.clone(),
            });
        }
        Ok(())
    }

    fn key(&self) -> (usize, usize, &str) {
        (self.start, self.end, self.label.as_str())
    }
}

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Span {}

impl Hash for Span {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Span {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}, {})", self.label, self.start, self.end)
    }
}

// ============================================================================
// Tests
// ============================================================================
