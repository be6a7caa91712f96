use crate::errors::PipelineError;
use crate::nlp::tokenizer::token_spans;
use crate::pipeline::artifacts::{Shape, StageValue};
use crate::pipeline::traits::{mismatch, Stage, STAGE_TOKENIZER};

/// `text → token sequence` stage.
///
/// See [`crate::nlp::tokenizer`] for the boundary rules. An optional
/// `max_tokens` guard fails documents that produce more tokens than
/// allowed; the failure is confined to that document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    max_tokens: Option<usize>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_tokens(&self) -> Option<usize> {
        self.max_tokens
    }
}

impl Stage for Tokenizer {
    fn name(&self) -> &'static str {
        STAGE_TOKENIZER
    }

    fn input_shape(&self) -> Shape {
        Shape::Text
    }

    fn output_shape(&self) -> Shape {
        Shape::TokenSequence
    }

    fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError> {
        let text = match input {
            StageValue::Text(text) => text,
            other => return Err(mismatch(self, &other)),
        };

        let mut tokens = Vec::new();
        for span in token_spans(&text) {
            if let Some(limit) = self.max_tokens {
                if tokens.len() == limit {
                    return Err(PipelineError::processing(
                        STAGE_TOKENIZER,
                        format!("input exceeds max_tokens ({limit})"),
                    ));
                }
            }
            tokens.push(span.to_string());
        }
        Ok(StageValue::TokenSequence(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(value: StageValue) -> Vec<String> {
        value.into_tokens().unwrap()
    }

    #[test]
    fn test_tokenizes_text() {
        let out = Tokenizer::new()
            .apply(StageValue::from("Running is my Favorite COLOR."))
            .unwrap();
        assert_eq!(tokens(out), vec!["Running", "is", "my", "Favorite", "COLOR"]);
    }

    #[test]
    fn test_empty_input_yields_empty_sequence() {
        let out = Tokenizer::new().apply(StageValue::from("")).unwrap();
        assert!(tokens(out).is_empty());
    }

    #[test]
    fn test_max_tokens_at_limit_is_ok() {
        let out = Tokenizer::new()
            .with_max_tokens(3)
            .apply(StageValue::from("a b c"))
            .unwrap();
        assert_eq!(tokens(out).len(), 3);
    }

    #[test]
    fn test_max_tokens_exceeded_is_processing_failure() {
        let err = Tokenizer::new()
            .with_max_tokens(2)
            .apply(StageValue::from("a b c"))
            .unwrap_err();
        match err {
            PipelineError::Processing { stage, reason } => {
                assert_eq!(stage, "tokenizer");
                assert!(reason.contains("max_tokens"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rejects_token_input() {
        let err = Tokenizer::new()
            .apply(StageValue::from(vec!["a".to_string()]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::StageMismatch { .. }));
    }
}
