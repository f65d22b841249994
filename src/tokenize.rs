//! Vietnamese-aware query and document tokenization.
//!
//! Vietnamese writes one syllable per whitespace-separated unit, but words
//! routinely span several syllables ("hợp đồng", "lao động"), so whitespace
//! splitting alone under-segments the retrieval vocabulary. The
//! [`SyllableTokenizer`] emits every normalized syllable plus each adjacent
//! syllable pair joined with `_`, which lets compound legal terms match as
//! units without carrying a segmentation dictionary.
//!
//! Tokenization is deterministic and total: malformed or empty input yields
//! an empty term sequence, never an error.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref SYLLABLE: Regex = Regex::new(r"(?u)[\p{L}\p{N}]+").expect("valid regex");
}

/// Turns raw text into a sequence of retrieval terms.
///
/// Implementations must be deterministic for identical input and must be
/// safe to call concurrently.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Default tokenizer: NFC normalization, lowercase, syllable extraction,
/// and adjacent-syllable bigrams for compound coverage.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyllableTokenizer;

impl Tokenizer for SyllableTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfc().collect::<String>().to_lowercase();

        let syllables: Vec<&str> = SYLLABLE
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .collect();

        let mut terms = Vec::with_capacity(syllables.len() * 2);
        for s in &syllables {
            terms.push((*s).to_string());
        }
        for pair in syllables.windows(2) {
            terms.push(format!("{}_{}", pair[0], pair[1]));
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(text: &str) -> Vec<String> {
        SyllableTokenizer.tokenize(text)
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
        assert!(tokenize("!!! ... ???").is_empty());
    }

    #[test]
    fn test_lowercases_and_keeps_diacritics() {
        let terms = tokenize("Điều 1 Quy Định");
        assert!(terms.contains(&"điều".to_string()));
        assert!(terms.contains(&"quy".to_string()));
        assert!(terms.contains(&"định".to_string()));
        assert!(terms.contains(&"1".to_string()));
    }

    #[test]
    fn test_emits_adjacent_bigrams() {
        let terms = tokenize("hợp đồng lao động");
        assert!(terms.contains(&"hợp_đồng".to_string()));
        assert!(terms.contains(&"lao_động".to_string()));
        assert!(terms.contains(&"đồng_lao".to_string()));
    }

    #[test]
    fn test_deterministic() {
        let a = tokenize("Quyền và nghĩa vụ của người lao động");
        let b = tokenize("Quyền và nghĩa vụ của người lao động");
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_syllable_no_bigram() {
        let terms = tokenize("lương");
        assert_eq!(terms, vec!["lương".to_string()]);
    }

    #[test]
    fn test_normalization_unifies_composed_forms() {
        // "ế" as precomposed vs combining acute over "ê"
        let composed = tokenize("k\u{1ebf}t");
        let decomposed = tokenize("k\u{00ea}\u{0301}t");
        assert_eq!(composed, decomposed);
    }
}
