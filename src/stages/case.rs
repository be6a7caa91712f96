use crate::errors::PipelineError;
use crate::pipeline::artifacts::{Shape, StageValue};
use crate::pipeline::traits::{mismatch, Stage, STAGE_TO_LOWER_CASE};

/// Unicode-aware lowercasing over text or tokens.
///
/// The stage is configured for exactly one shape so the builder can check
/// it like any other stage; [`ToLowerCase::new`] targets token sequences.
/// Container shape and token order are preserved.
#[derive(Debug, Clone, Copy)]
pub struct ToLowerCase {
    shape: Shape,
}

impl Default for ToLowerCase {
    fn default() -> Self {
        Self::new()
    }
}

impl ToLowerCase {
    /// Lowercase every token of a token sequence.
    pub fn new() -> Self {
        Self {
            shape: Shape::TokenSequence,
        }
    }

    /// Lowercase a whole text before tokenization.
    pub fn for_text() -> Self {
        Self { shape: Shape::Text }
    }

    /// Configure for `shape`; only textual shapes are accepted.
    pub fn for_shape(shape: Shape) -> Result<Self, PipelineError> {
        if shape.is_textual() {
            Ok(Self { shape })
        } else {
            Err(PipelineError::Configuration(format!(
                "{STAGE_TO_LOWER_CASE} cannot operate on {shape}"
            )))
        }
    }
}

impl Stage for ToLowerCase {
    fn name(&self) -> &'static str {
        STAGE_TO_LOWER_CASE
    }

    fn input_shape(&self) -> Shape {
        self.shape
    }

    fn output_shape(&self) -> Shape {
        self.shape
    }

    fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError> {
        match input {
            StageValue::Text(text) if self.shape == Shape::Text => {
                Ok(StageValue::Text(text.to_lowercase()))
            }
            StageValue::TokenSequence(tokens) if self.shape == Shape::TokenSequence => Ok(
                StageValue::TokenSequence(tokens.iter().map(|t| t.to_lowercase()).collect()),
            ),
            other => Err(mismatch(self, &other)),
        }
    }

    fn is_idempotent(&self) -> bool {
        true
    }
}
