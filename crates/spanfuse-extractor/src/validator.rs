//! Code-format validation
//!
//! Checks that the text of a detected entity has the shape its label
//! requires, e.g. six digits for a NAICS code.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use spanfuse_core::{Result, SpanfuseError, ValidationConfig};

/// Built-in label patterns
pub const DEFAULT_PATTERNS: &[(&str, &str, &str)] = &[
    ("NAICS", r"^\d{6}$", "6 digits (e.g., 541511)"),
    (
        "PSC",
        r"^[A-Z0-9]{4}$",
        "4 alphanumeric characters (e.g., 7030, D302)",
    ),
];

static DEFAULT_REGEXES: Lazy<HashMap<String, Regex>> = Lazy::new(|| {
    DEFAULT_PATTERNS
        .iter()
        .filter_map(|(label, pattern, _)| {
            Regex::new(pattern)
                .ok()
                .map(|regex| (label.to_string(), regex))
        })
        .collect()
});

/// Per-label regex registry
#[derive(Debug, Clone)]
pub struct CodeFormatValidator {
    patterns: HashMap<String, Regex>,
}

impl CodeFormatValidator {
    /// Validator with the NAICS and PSC patterns registered
    pub fn new() -> Self {
        Self {
            patterns: DEFAULT_REGEXES.clone(),
        }
    }

    /// Validator with no patterns; every label validates
    pub fn empty() -> Self {
        Self {
            patterns: HashMap::new(),
        }
    }

    /// Built-in patterns plus those from configuration
    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        let mut validator = Self::new();
        for (label, pattern) in &config.patterns {
            validator.register(label, pattern)?;
        }
        Ok(validator)
    }

    /// Register (or replace) the pattern for `label`
    pub fn register(&mut self, label: &str, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|e| SpanfuseError::InvalidPattern {
            label: label.to_string(),
            message: e.to_string(),
        })?;
        self.patterns.insert(label.to_string(), regex);
        Ok(())
    }

    pub fn has_pattern(&self, label: &str) -> bool {
        self.patterns.contains_key(label)
    }

    /// Registered pattern source for `label`
    pub fn pattern(&self, label: &str) -> Option<&str> {
        self.patterns.get(label).map(Regex::as_str)
    }

    /// True unless `label` has a pattern that the trimmed text fails to match
    pub fn validate(&self, text: &str, label: &str) -> bool {
        match self.patterns.get(label) {
            Some(regex) => regex.is_match(text.trim()),
            None => true,
        }
    }
}

impl Default for CodeFormatValidator {
    fn default() -> Self {
        Self::new()
    }
}
