//! Property tests for stage invariants.

use proptest::prelude::*;
use rapid_textnorm::nlp::{porter, tokenizer};
use rapid_textnorm::prelude::*;

proptest! {
    #[test]
    fn lower_case_twice_equals_once(tokens in prop::collection::vec("\\PC{0,12}", 0..20)) {
        let stage = ToLowerCase::new();
        let once = stage.apply(StageValue::from(tokens)).unwrap();
        let twice = stage.apply(once.clone()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn lower_case_preserves_length_and_order(tokens in prop::collection::vec("[A-Za-z]{1,8}", 0..20)) {
        let out = ToLowerCase::new().apply(StageValue::from(tokens.clone())).unwrap();
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        prop_assert_eq!(out.as_tokens().unwrap(), lowered.as_slice());
    }

    #[test]
    fn tokens_never_empty_or_padded(text in "\\PC{0,80}") {
        for token in tokenizer::tokenize(&text) {
            prop_assert!(!token.is_empty());
            prop_assert!(!token.chars().any(char::is_whitespace));
            prop_assert!(token.chars().next().is_some_and(char::is_alphanumeric));
            prop_assert!(token.chars().last().is_some_and(char::is_alphanumeric));
        }
    }

    #[test]
    fn plain_words_survive_tokenization(words in prop::collection::vec("[a-z0-9]{1,10}", 0..30)) {
        let text = words.join("  ");
        prop_assert_eq!(tokenizer::tokenize(&text), words);
    }

    #[test]
    fn stemmer_never_grows_words(word in "[a-z]{0,15}") {
        let stemmed = porter::stem(&word);
        prop_assert!(stemmed.len() <= word.len());
        prop_assert!(word.starts_with(&stemmed[..stemmed.len().min(1)]));
    }

    #[test]
    fn stemmer_leaves_short_and_foreign_words(
        word in "[A-Za-z]{0,5}[0-9éü'-][A-Za-z0-9]{0,5}|[a-zA-Z]{0,2}"
    ) {
        prop_assert_eq!(porter::stem(&word), word);
    }

    #[test]
    fn stemmer_ignores_letter_case(word in "[a-zA-Z]{3,15}") {
        prop_assert_eq!(porter::stem(&word), porter::stem(&word.to_ascii_lowercase()));
    }
}
