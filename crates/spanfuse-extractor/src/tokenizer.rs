//! Tokenizer
//!
//! Splits text into word tokens with byte offsets. Whitespace separates
//! tokens; sentence punctuation becomes its own token. Apostrophes and
//! hyphens stay inside words, and `,`/`.` between digits stay inside numbers.

use spanfuse_core::{Document, Token};

/// Characters emitted as single-character tokens.
const SPLIT_PUNCTUATION: &[char] = &[',', '.', ';', ':', '!', '?', '(', ')', '"', '[', ']'];

/// Whitespace and punctuation tokenizer.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer;

impl Tokenizer {
    pub fn new() -> Self {
        Self
    }

    /// Tokenize `text` into a [`Document`].
    ///
    /// # Examples
    /// ```
    /// use spanfuse_extractor::Tokenizer;
    ///
    /// let doc = Tokenizer::new().tokenize("PSC D302, NAICS 541511.");
    /// let texts: Vec<&str> = doc.tokens.iter().map(|t| t.text.as_str()).collect();
    /// assert_eq!(texts, ["PSC", "D302", ",", "NAICS", "541511", "."]);
    /// ```
    pub fn tokenize(&self, text: &str) -> Document {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut tokens = Vec::new();
        let mut current_start: Option<usize> = None;

        for (i, &(idx, c)) in chars.iter().enumerate() {
            if c.is_whitespace() {
                if let Some(start) = current_start.take() {
                    push_token(&mut tokens, text, start, idx);
                }
                continue;
            }

            if SPLIT_PUNCTUATION.contains(&c) && !is_numeric_separator(&chars, i) {
                if let Some(start) = current_start.take() {
                    push_token(&mut tokens, text, start, idx);
                }
                push_token(&mut tokens, text, idx, idx + c.len_utf8());
                continue;
            }

            if current_start.is_none() {
                current_start = Some(idx);
            }
        }

        if let Some(start) = current_start {
            push_token(&mut tokens, text, start, text.len());
        }

        Document {
            text: text.to_string(),
            tokens,
        }
    }
}

fn push_token(tokens: &mut Vec<Token>, text: &str, start: usize, end: usize) {
    let index = tokens.len();
    tokens.push(Token {
        text: text[start..end].to_string(),
        start,
        end,
        index,
    });
}

/// `1,000` and `3.5` keep their separator
fn is_numeric_separator(chars: &[(usize, char)], i: usize) -> bool {
    let c = chars[i].1;
    if c != ',' && c != '.' {
        return false;
    }
    let prev = i.checked_sub(1).map(|p| chars[p].1);
    let next = chars.get(i + 1).map(|&(_, n)| n);
    matches!((prev, next), (Some(p), Some(n)) if p.is_ascii_digit() && n.is_ascii_digit())
}
