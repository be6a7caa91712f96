//! Pipeline runner: links stages and threads values through them.
//!
//! A [`Pipeline`] is an immutable, validated list of [`Stage`] trait
//! objects. It is created only through [`PipelineBuilder::build`], which runs
//! the chain rules of [`ValidationEngine`] over the declared shapes before
//! anything executes. Calling [`Pipeline::run`] applies the stages in order,
//! stopping at the first error, and notifies an optional
//! [`PipelineObserver`] at each boundary.
//!
//! # Dynamic dispatch
//!
//! Stages are chosen at runtime (from code or from a
//! [`PipelineSpec`](super::spec::PipelineSpec)), so the pipeline holds
//! `Arc<dyn Stage>` rather than a monomorphized tuple. Cloning a pipeline is
//! a reference-count bump; every clone shares the same stages and tables.

use std::sync::Arc;

use crate::errors::PipelineError;
use crate::pipeline::artifacts::{Shape, StageValue};
use crate::pipeline::observer::{NoopObserver, PipelineObserver, StageClock, StageReport};
use crate::pipeline::traits::{mismatch, Stage};
use crate::pipeline::validation::{ChainPlan, ValidationEngine, ValidationRule};
use crate::types::{Document, ResultItem};

// ---------------------------------------------------------------------------
// Tracing support
// ---------------------------------------------------------------------------

/// Enter a tracing span for a pipeline stage.
macro_rules! trace_stage {
    ($name:expr) => {
        let _span = tracing::debug_span!("pipeline_stage", stage = $name).entered();
    };
}

// ============================================================================
// Pipeline
// ============================================================================

/// An ordered, shape-checked chain of stages.
///
/// Immutable after construction and safe to share across threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Stage>]>,
}

impl Pipeline {
    /// Start an empty [`PipelineBuilder`].
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false` for a built pipeline; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Shape accepted by the first stage.
    pub fn input_shape(&self) -> Option<Shape> {
        self.stages.first().map(|s| s.input_shape())
    }

    /// Shape produced by the last stage.
    pub fn output_shape(&self) -> Option<Shape> {
        self.stages.last().map(|s| s.output_shape())
    }

    /// Execute every stage in order on `input`.
    pub fn run(&self, input: StageValue) -> Result<StageValue, PipelineError> {
        self.run_observed(input, &mut NoopObserver)
    }

    /// Execute every stage in order, reporting each boundary to `observer`.
    ///
    /// The observer sees a failed [`StageReport`] for the stage that errors;
    /// later stages are not started.
    pub fn run_observed(
        &self,
        input: StageValue,
        observer: &mut impl PipelineObserver,
    ) -> Result<StageValue, PipelineError> {
        let mut value = input;
        for stage in self.stages.iter() {
            let name = stage.name();
            trace_stage!(name);
            observer.on_stage_start(name);
            let clock = StageClock::start();
            let result = apply_guarded(stage.as_ref(), value);
            let report = match &result {
                Ok(out) => StageReport::new(clock.elapsed()).with_items(out.item_count()),
                Err(_) => StageReport::new(clock.elapsed()).failed(),
            };
            observer.on_stage_end(name, &report);
            value = result?;
        }
        Ok(value)
    }

    /// Run a raw text through the pipeline.
    pub fn process_text(&self, text: &str) -> Result<StageValue, PipelineError> {
        self.run(StageValue::from(text))
    }

    /// Run one document and correlate the outcome with its id.
    pub fn run_document(&self, doc: Document) -> ResultItem {
        let Document { id, input } = doc;
        match self.run(StageValue::Text(input)) {
            Ok(value) => ResultItem::success(id, value),
            Err(err) => ResultItem::failure(id, err),
        }
    }
}

/// Apply `stage`, checking the runtime shape on both sides.
///
/// Build-time validation makes these checks unreachable for well-behaved
/// stages; a hit means a stage broke its declared contract.
fn apply_guarded(stage: &dyn Stage, input: StageValue) -> Result<StageValue, PipelineError> {
    if input.shape() != stage.input_shape() {
        tracing::error!(
            stage = stage.name(),
            expected = %stage.input_shape(),
            found = %input.shape(),
            "stage received a value of the wrong shape"
        );
        return Err(mismatch(stage, &input));
    }

    let output = stage.apply(input)?;
    if output.shape() != stage.output_shape() {
        tracing::error!(
            stage = stage.name(),
            expected = %stage.output_shape(),
            found = %output.shape(),
            "stage produced a value of the wrong shape"
        );
        return Err(PipelineError::StageMismatch {
            stage: stage.name(),
            expected: stage.output_shape(),
            found: output.shape(),
        });
    }
    Ok(output)
}

// ============================================================================
// PipelineBuilder
// ============================================================================

/// Fluent builder for a [`Pipeline`].
///
/// ```
/// # use rapid_textnorm::pipeline::runner::Pipeline;
/// # use rapid_textnorm::stages::{Tokenizer, ToLowerCase};
/// let pipeline = Pipeline::builder()
///     .stage(Tokenizer::new())
///     .stage(ToLowerCase::new())
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.stage_names(), vec!["tokenizer", "to_lower_case"]);
/// ```
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
    engine: ValidationEngine<ChainPlan>,
}

impl PipelineBuilder {
    /// Start with no stages and the default chain rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append an already-shared stage.
    pub fn stage_arc(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append several shared stages.
    pub fn stages(mut self, stages: impl IntoIterator<Item = Arc<dyn Stage>>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Register an extra chain rule on top of the defaults.
    pub fn with_rule(mut self, rule: impl ValidationRule<ChainPlan> + 'static) -> Self {
        self.engine.add_rule(Box::new(rule));
        self
    }

    /// Validate the chain and produce a [`Pipeline`].
    ///
    /// Fails with [`PipelineError::Validation`] for an empty chain and
    /// [`PipelineError::ChainType`] for the first incompatible link. No
    /// stage is executed.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let plan = ChainPlan::from_stages(&self.stages);
        if let Some(err) = self.engine.validate(&plan).into_first_error() {
            return Err(err.into());
        }

        tracing::debug!(
            stages = ?plan.stages.iter().map(|s| s.name).collect::<Vec<_>>(),
            "pipeline built"
        );
        Ok(Pipeline {
            stages: self.stages.into(),
        })
    }
}
