//! Batch-level data types: documents in, correlated results out.

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::pipeline::artifacts::StageValue;

/// A unit of work: an opaque id plus the raw text to normalize.
///
/// Ids only need to be unique within one batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub input: String,
}

impl Document {
    pub fn new(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
        }
    }
}

impl<I: Into<String>, T: Into<String>> From<(I, T)> for Document {
    fn from((id, input): (I, T)) -> Self {
        Self::new(id, input)
    }
}

/// Result of pushing one [`Document`] through a pipeline.
///
/// `id` is always the originating document's id, regardless of the order in
/// which documents complete.
#[derive(Debug)]
pub struct ResultItem {
    pub id: String,
    pub outcome: Result<StageValue, PipelineError>,
}

impl ResultItem {
    pub fn success(id: impl Into<String>, value: StageValue) -> Self {
        Self {
            id: id.into(),
            outcome: Ok(value),
        }
    }

    pub fn failure(id: impl Into<String>, error: PipelineError) -> Self {
        Self {
            id: id.into(),
            outcome: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&StageValue> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.outcome.as_ref().err()
    }

    /// Tokens of a successful token-sequence result.
    pub fn tokens(&self) -> Option<&[String]> {
        self.value().and_then(StageValue::as_tokens)
    }
}
