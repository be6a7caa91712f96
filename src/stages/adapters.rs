//! Boundary adapters: hand raw text into the pipeline and package the final
//! tokens for export. Neither changes token content.

use serde_json::Value;

use crate::errors::PipelineError;
use crate::pipeline::artifacts::{Record, Shape, StageValue};
use crate::pipeline::traits::{mismatch, Stage, STAGE_POST_PROCESSOR, STAGE_PRE_PROCESSOR};

/// Identity `text → text` stage.
///
/// The input string is moved, never copied, into the pipeline's internal
/// value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreProcessor;

impl Stage for PreProcessor {
    fn name(&self) -> &'static str {
        STAGE_PRE_PROCESSOR
    }

    fn input_shape(&self) -> Shape {
        Shape::Text
    }

    fn output_shape(&self) -> Shape {
        Shape::Text
    }

    #[inline]
    fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError> {
        match input {
            StageValue::Text(_) => Ok(input),
            other => Err(mismatch(self, &other)),
        }
    }

    fn is_idempotent(&self) -> bool {
        true
    }
}

/// Packages a token sequence as `{ "tokens": [...], "token_count": n }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostProcessor;

impl PostProcessor {
    pub const TOKENS_FIELD: &'static str = "tokens";
    pub const COUNT_FIELD: &'static str = "token_count";
}

impl Stage for PostProcessor {
    fn name(&self) -> &'static str {
        STAGE_POST_PROCESSOR
    }

    fn input_shape(&self) -> Shape {
        Shape::TokenSequence
    }

    fn output_shape(&self) -> Shape {
        Shape::StructuredRecord
    }

    fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError> {
        let tokens = match input {
            StageValue::TokenSequence(tokens) => tokens,
            other => return Err(mismatch(self, &other)),
        };

        let mut record = Record::new();
        record.insert(Self::COUNT_FIELD.to_string(), Value::from(tokens.len()));
        record.insert(
            Self::TOKENS_FIELD.to_string(),
            Value::Array(tokens.into_iter().map(Value::String).collect()),
        );
        Ok(StageValue::StructuredRecord(record))
    }
}
