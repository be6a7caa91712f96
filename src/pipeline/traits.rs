//! Stage trait definition for the pipeline.
//!
//! A [`Stage`] is one transformation step with exactly one declared input
//! [`Shape`] and one declared output [`Shape`]. Stages are selected at
//! runtime and held as trait objects; the builder compares the declared tags
//! of adjacent stages once, at link time, and the runner only re-checks the
//! runtime shape as a guard against broken invariants.
//!
//! # Contract
//!
//! - **Stateless per call**: `apply` must not keep per-document state between
//!   invocations. The same instance is shared by every worker of a batch.
//! - **Shape-honest**: given a value of `input_shape()`, `apply` returns a
//!   value of `output_shape()` or an error.
//! - **Wrong input shape**: return [`mismatch`] rather than panicking.

use std::fmt::Debug;

use crate::errors::PipelineError;
use crate::pipeline::artifacts::{Shape, StageValue};

// ============================================================================
// Stage names
// ============================================================================

pub const STAGE_PRE_PROCESSOR: &str = "pre_processor";
pub const STAGE_TOKENIZER: &str = "tokenizer";
pub const STAGE_TO_LOWER_CASE: &str = "to_lower_case";
pub const STAGE_SPELLING_MAPPER: &str = "spelling_mapper";
pub const STAGE_LEMMATIZER: &str = "lemmatizer";
pub const STAGE_PORTER_STEMMER: &str = "porter_stemmer";
pub const STAGE_POST_PROCESSOR: &str = "post_processor";

// ============================================================================
// Stage
// ============================================================================

/// One transformation step: consume a value of one shape, produce another.
pub trait Stage: Debug + Send + Sync {
    /// Short, stable identifier (e.g. `"tokenizer"`).
    fn name(&self) -> &'static str;

    /// The one shape this stage accepts.
    fn input_shape(&self) -> Shape;

    /// The one shape this stage produces.
    fn output_shape(&self) -> Shape;

    /// Transform `input`.
    fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError>;

    /// `true` if running this stage twice in a row equals running it once.
    ///
    /// Used only for validation warnings.
    fn is_idempotent(&self) -> bool {
        false
    }
}

/// Build the error a stage returns when handed a value of the wrong shape.
pub fn mismatch(stage: &dyn Stage, found: &StageValue) -> PipelineError {
    PipelineError::StageMismatch {
        stage: stage.name(),
        expected: stage.input_shape(),
        found: found.shape(),
    }
}
