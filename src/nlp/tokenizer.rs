//! Whitespace tokenizer with boundary punctuation stripping.
//!
//! Boundary rules:
//!
//! 1. Split on Unicode whitespace.
//! 2. Trim every leading and trailing character that is not alphanumeric
//!    (Unicode-aware), e.g. quotes, brackets, commas, full stops.
//! 3. Drop chunks that are empty after trimming (stray punctuation).
//!
//! Punctuation *inside* a token is kept, so contractions (`don't`,
//! `Chair’s`), compounds (`long-term`), abbreviations (`e.g`) and numbers
//! (`3.14`) survive as single tokens.

/// Iterate over the token slices of `text` without allocating.
pub fn token_spans(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .map(trim_boundary)
        .filter(|token| !token.is_empty())
}

/// Tokenize `text` into owned tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    token_spans(text).map(str::to_string).collect()
}

fn trim_boundary(chunk: &str) -> &str {
    chunk.trim_matches(|c: char| !c.is_alphanumeric())
}
