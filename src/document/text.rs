//! Full-text tokenization
//!
//! Text is split on a configurable set of whitespace characters, lower-cased,
//! and stripped of English stop words.

use std::collections::BTreeSet;

/// Default delimiters for full-text tokenization
pub const DEFAULT_WHITESPACE_CHARS: &str = " \t\n\r\u{c}.,;:!?\"'()[]{}";

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Splits text into lower-cased, stop-word-free tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTokenizer {
    whitespace_chars: String,
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_WHITESPACE_CHARS)
    }
}

impl TextTokenizer {
    pub fn new(whitespace_chars: impl Into<String>) -> Self {
        Self {
            whitespace_chars: whitespace_chars.into(),
        }
    }

    pub fn whitespace_chars(&self) -> &str {
        &self.whitespace_chars
    }

    /// Tokenizes text into a deduplicated, ordered token set
    pub fn tokenize(&self, text: &str) -> BTreeSet<String> {
        text.split(|c: char| self.whitespace_chars.contains(c))
            .filter(|word| !word.is_empty())
            .filter_map(|word| self.convert_word(word))
            .collect()
    }

    /// Splits a search query into terms.
    ///
    /// Unlike [`tokenize`](Self::tokenize), `*` wildcards are kept so that
    /// prefix and suffix searches survive.
    pub fn query_terms(&self, query: &str) -> Vec<TextTerm> {
        let mut terms: Vec<TextTerm> = query
            .split(|c: char| self.whitespace_chars.contains(c))
            .filter(|word| !word.is_empty())
            .filter_map(|word| {
                let prefix = word.ends_with('*');
                let suffix = word.starts_with('*');
                let core = word.trim_matches('*');
                if core.is_empty() {
                    return None;
                }
                let core = self.convert_word(core)?;
                Some(match (suffix, prefix) {
                    (true, true) => TextTerm::Contains(core),
                    (false, true) => TextTerm::Prefix(core),
                    (true, false) => TextTerm::Suffix(core),
                    (false, false) => TextTerm::Exact(core),
                })
            })
            .collect();
        terms.dedup();
        terms
    }

    fn convert_word(&self, word: &str) -> Option<String> {
        let word = word.to_lowercase();
        if STOP_WORDS.contains(&word.as_str()) {
            return None;
        }
        Some(word)
    }
}

/// One term of a full-text query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextTerm {
    Exact(String),
    /// `word*`
    Prefix(String),
    /// `*word`
    Suffix(String),
    /// `*word*`
    Contains(String),
}

impl TextTerm {
    /// Returns true if a single token satisfies this term
    pub fn matches_token(&self, token: &str) -> bool {
        match self {
            TextTerm::Exact(t) => token == t,
            TextTerm::Prefix(t) => token.starts_with(t.as_str()),
            TextTerm::Suffix(t) => token.ends_with(t.as_str()),
            TextTerm::Contains(t) => token.contains(t.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stop_words() {
        let tokens = TextTokenizer::default().tokenize("The Matrix Reloaded");
        let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        assert_eq!(tokens, vec!["matrix", "reloaded"]);
    }

    #[test]
    fn test_custom_whitespace() {
        let tokenizer = TextTokenizer::new("-");
        let tokens = tokenizer.tokenize("red-green blue");
        assert!(tokens.contains("red"));
        assert!(tokens.contains("green blue"));
    }

    #[test]
    fn test_query_terms_with_wildcards() {
        let terms = TextTokenizer::default().query_terms("matr* *aded *tri* Speed");
        assert_eq!(
            terms,
            vec![
                TextTerm::Prefix("matr".into()),
                TextTerm::Suffix("aded".into()),
                TextTerm::Contains("tri".into()),
                TextTerm::Exact("speed".into()),
            ]
        );
        assert!(terms[0].matches_token("matrix"));
        assert!(terms[1].matches_token("reloaded"));
        assert!(!terms[3].matches_token("speedy"));
    }

    #[test]
    fn test_query_of_only_stop_words_is_empty() {
        assert!(TextTokenizer::default().query_terms("the of and").is_empty());
    }
}
