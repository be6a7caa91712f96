use crate::errors::PipelineError;
use crate::nlp::porter;
use crate::pipeline::artifacts::{Shape, StageValue};
use crate::pipeline::traits::{mismatch, Stage, STAGE_PORTER_STEMMER};

/// Porter stemming over every token.
///
/// Stateless; alphabetic tokens come out lowercase, tokens outside the
/// stemmer's domain (see [`crate::nlp::porter`]) pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PorterStemmer;

impl Stage for PorterStemmer {
    fn name(&self) -> &'static str {
        STAGE_PORTER_STEMMER
    }

    fn input_shape(&self) -> Shape {
        Shape::TokenSequence
    }

    fn output_shape(&self) -> Shape {
        Shape::TokenSequence
    }

    fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError> {
        let tokens = match input {
            StageValue::TokenSequence(tokens) => tokens,
            other => return Err(mismatch(self, &other)),
        };

        let stemmed = tokens
            .into_iter()
            .map(|token| {
                if porter::is_stemmable(&token) {
                    porter::stem(&token)
                } else {
                    token
                }
            })
            .collect();
        Ok(StageValue::TokenSequence(stemmed))
    }
}
