//! Rule-based token pattern matcher
//!
//! A pattern is a sequence of token rules, each a predicate with a
//! quantifier. Every way a pattern can match is reported, so one product
//! mention such as "iPhone 15 Pro" yields several overlapping candidates
//! that the merge resolver narrows down.

use std::collections::{BTreeSet, HashSet};

use spanfuse_core::{Document, Result, Span, Token};

use crate::SpanMatcher;

// ============================================================================
// Pattern building blocks
// ============================================================================

/// Test applied to a single token
#[derive(Debug, Clone)]
pub enum TokenPredicate {
    /// Lower-cased text is one of the given words
    LowerIn(HashSet<String>),
    IsAlpha,
    IsUpper,
    LikeNum,
    /// Character length within `[min, max]`
    Length { min: usize, max: usize },
    /// Every inner predicate holds
    All(Vec<TokenPredicate>),
}

impl TokenPredicate {
    pub fn lower_in(words: &[&str]) -> Self {
        Self::LowerIn(words.iter().map(|w| w.to_lowercase()).collect())
    }

    pub fn matches(&self, token: &Token) -> bool {
        match self {
            Self::LowerIn(words) => words.contains(&token.lower()),
            Self::IsAlpha => token.is_alpha(),
            Self::IsUpper => token.is_upper(),
            Self::LikeNum => token.like_num(),
            Self::Length { min, max } => (*min..=*max).contains(&token.char_len()),
            Self::All(inner) => inner.iter().all(|p| p.matches(token)),
        }
    }
}

/// How many consecutive tokens a rule consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    One,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
}

#[derive(Debug, Clone)]
pub struct TokenRule {
    pub predicate: TokenPredicate,
    pub quantifier: Quantifier,
}

impl TokenRule {
    pub fn one(predicate: TokenPredicate) -> Self {
        Self {
            predicate,
            quantifier: Quantifier::One,
        }
    }

    pub fn optional(predicate: TokenPredicate) -> Self {
        Self {
            predicate,
            quantifier: Quantifier::Optional,
        }
    }

    pub fn zero_or_more(predicate: TokenPredicate) -> Self {
        Self {
            predicate,
            quantifier: Quantifier::ZeroOrMore,
        }
    }
}

pub type TokenPattern = Vec<TokenRule>;

// ============================================================================
// Matcher
// ============================================================================

/// Labeled token patterns evaluated at every token position
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    patterns: Vec<(String, TokenPattern)>,
}

impl PatternMatcher {
    /// Matcher with no patterns
    pub fn new() -> Self {
        Self::default()
    }

    /// Matcher preloaded with the PRODUCT and EVENT patterns
    pub fn products_and_events() -> Self {
        let mut matcher = Self::new();
        matcher.init_product_patterns();
        matcher.init_event_patterns();
        matcher
    }

    /// Add patterns under one label
    pub fn add(&mut self, label: &str, patterns: Vec<TokenPattern>) {
        for pattern in patterns {
            if !pattern.is_empty() {
                self.patterns.push((label.to_string(), pattern));
            }
        }
    }

    /// Labels with at least one pattern, sorted
    pub fn labels(&self) -> Vec<&str> {
        let labels: BTreeSet<&str> = self.patterns.iter().map(|(l, _)| l.as_str()).collect();
        labels.into_iter().collect()
    }

    fn init_product_patterns(&mut self) {
        use TokenPredicate::{IsAlpha, LikeNum};

        self.add(
            "PRODUCT",
            vec![
                // Tech products: "iPhone 15", "Galaxy S24", "MacBook Pro"
                vec![
                    TokenRule::one(TokenPredicate::lower_in(&[
                        "iphone", "ipad", "macbook", "imac", "airpods", "galaxy", "pixel",
                    ])),
                    TokenRule::optional(IsAlpha),
                    TokenRule::optional(LikeNum),
                ],
                // Car models: "Model S", "F-150"
                vec![
                    TokenRule::one(TokenPredicate::lower_in(&[
                        "model", "f-150", "mustang", "camry", "accord", "civic",
                    ])),
                    TokenRule::zero_or_more(IsAlpha),
                ],
                // Software: "Windows 11", "iOS 17"
                vec![
                    TokenRule::one(TokenPredicate::lower_in(&[
                        "windows", "ios", "android", "macos", "linux",
                    ])),
                    TokenRule::optional(LikeNum),
                ],
                // Gaming: "Xbox Series X", "Nintendo Switch"
                vec![
                    TokenRule::one(TokenPredicate::lower_in(&["playstation", "xbox", "nintendo"])),
                    TokenRule::zero_or_more(IsAlpha),
                ],
            ],
        );
    }

    fn init_event_patterns(&mut self) {
        use TokenPredicate::LikeNum;

        self.add(
            "EVENT",
            vec![
                // Sports events: "Super Bowl", "World Cup"
                vec![
                    TokenRule::one(TokenPredicate::lower_in(&["super", "world", "winter", "summer"])),
                    TokenRule::one(TokenPredicate::lower_in(&[
                        "bowl",
                        "cup",
                        "olympics",
                        "games",
                        "series",
                        "championship",
                    ])),
                ],
                // Conferences: "WWDC", "CES 2024"
                vec![
                    TokenRule::one(TokenPredicate::All(vec![
                        TokenPredicate::IsUpper,
                        TokenPredicate::Length { min: 2, max: 5 },
                    ])),
                    TokenRule::optional(LikeNum),
                ],
                // Awards: "Grammy Awards", "Nobel Prize"
                vec![
                    TokenRule::one(TokenPredicate::lower_in(&[
                        "academy", "emmy", "grammy", "golden", "nobel",
                    ])),
                    TokenRule::one(TokenPredicate::lower_in(&[
                        "awards", "prize", "ceremony", "globes",
                    ])),
                ],
                // Elections: "2024 Presidential Election"
                vec![
                    TokenRule::optional(LikeNum),
                    TokenRule::one(TokenPredicate::lower_in(&[
                        "presidential",
                        "midterm",
                        "general",
                        "primary",
                    ])),
                    TokenRule::one(TokenPredicate::lower_in(&["election", "elections", "race"])),
                ],
                // Generic event keywords
                vec![
                    TokenRule::one(TokenPredicate::lower_in(&[
                        "festival",
                        "conference",
                        "summit",
                        "expo",
                        "fair",
                    ])),
                    TokenRule::optional(LikeNum),
                ],
            ],
        );
    }

    /// End positions reachable by matching `pattern` from `start`
    fn match_ends(pattern: &[TokenRule], tokens: &[Token], start: usize) -> BTreeSet<usize> {
        let mut states = BTreeSet::from([start]);

        for rule in pattern {
            let mut next = BTreeSet::new();
            for &pos in &states {
                let hit = |i: usize| i < tokens.len() && rule.predicate.matches(&tokens[i]);
                match rule.quantifier {
                    Quantifier::One => {
                        if hit(pos) {
                            next.insert(pos + 1);
                        }
                    }
                    Quantifier::Optional => {
                        next.insert(pos);
                        if hit(pos) {
                            next.insert(pos + 1);
                        }
                    }
                    Quantifier::ZeroOrMore => {
                        next.insert(pos);
                        let mut k = pos;
                        while hit(k) {
                            k += 1;
                            next.insert(k);
                        }
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            states = next;
        }

        states
    }
}

impl SpanMatcher for PatternMatcher {
    fn find_spans(&self, document: &Document) -> Result<Vec<Span>> {
        let mut found = BTreeSet::new();

        for (label, pattern) in &self.patterns {
            for start in 0..document.tokens.len() {
                for end in Self::match_ends(pattern, &document.tokens, start) {
                    if end > start {
                        found.insert(Span::rule(start, end, label.as_str()));
                    }
                }
            }
        }

        tracing::debug!(
            "Pattern matcher proposed {} spans over {} tokens",
            found.len(),
            document.tokens.len()
        );

        Ok(found.into_iter().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
