//! Text preprocessing for model training and embedding.
//!
//! Tokens are maximal runs of alphabetic characters inside each Unicode
//! word, lowercased, and kept when they are `MIN_TOKEN_LEN..=MAX_TOKEN_LEN`
//! characters long. There is no stop-word list; very common words are
//! removed by the dictionary's document-frequency filter instead.

use unicode_segmentation::UnicodeSegmentation;

/// Shortest token kept, in characters.
pub const MIN_TOKEN_LEN: usize = 2;

/// Longest token kept, in characters.
pub const MAX_TOKEN_LEN: usize = 15;

/// Split text into lowercase alphabetic tokens.
///
/// Digits and punctuation break tokens, so `abc123def` gives `abc` and
/// `def`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .flat_map(|word| word.split(|c: char| !c.is_alphabetic()))
        .map(str::to_lowercase)
        .filter(|token| (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&token.chars().count()))
        .collect()
}
