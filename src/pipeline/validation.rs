//! Validation engine for pipeline definitions.
//!
//! The engine runs all registered [`ValidationRule`]s against a subject and
//! collects every diagnostic into a [`ValidationReport`]; it never
//! short-circuits on the first error, so users see all problems at once.
//!
//! Two subjects are validated:
//!
//! - [`ChainPlan`]: the declared shapes of a linked stage list. Checked by
//!   [`PipelineBuilder::build`](super::runner::PipelineBuilder::build) before
//!   any stage runs.
//! - [`PipelineSpec`]: the JSON descriptor, checked before any table is
//!   loaded.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use rapid_textnorm::pipeline::validation::{ChainPlan, ValidationEngine};
//!
//! let engine = ValidationEngine::<ChainPlan>::with_defaults();
//! let report = engine.validate(&plan);
//! for err in report.errors() {
//!     eprintln!("{err}");
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::artifacts::Shape;
use super::spec::{PipelineSpec, StageSpec, SPEC_VERSION};
use super::traits::{Stage, STAGE_POST_PROCESSOR, STAGE_TOKENIZER};
use crate::error_code::ErrorCode;
use crate::errors::{ChainTypeError, PipelineSpecError, DOCUMENT_SOURCE};

// ─── Severity ───────────────────────────────────────────────────────────────

/// Whether a diagnostic is a hard error or a soft warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

// ─── Diagnostic ─────────────────────────────────────────────────────────────

/// A single validation finding: an error or warning attached to a
/// [`PipelineSpecError`] that carries the code, path, message, and hint.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub error: PipelineSpecError,
}

impl ValidationDiagnostic {
    pub fn error(err: PipelineSpecError) -> Self {
        Self {
            severity: Severity::Error,
            error: err,
        }
    }

    pub fn warning(err: PipelineSpecError) -> Self {
        Self {
            severity: Severity::Warning,
            error: err,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Collected diagnostics from running all validation rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    /// Iterate over error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &PipelineSpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| &d.error)
    }

    /// Iterate over warning-severity diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &PipelineSpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| &d.error)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns `true` if there are no errors (warnings are acceptable).
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Log warnings, then return the first error (in rule order) if any.
    pub fn into_first_error(self) -> Option<PipelineSpecError> {
        let mut first = None;
        for diag in self.diagnostics {
            match diag.severity {
                Severity::Warning => {
                    tracing::warn!(code = %diag.error.code, path = %diag.error.path, "{}", diag.error.message);
                }
                Severity::Error if first.is_none() => first = Some(diag.error),
                Severity::Error => {}
            }
        }
        first
    }
}

// ─── Rule trait ─────────────────────────────────────────────────────────────

/// A single validation rule that inspects a subject and returns zero or
/// more diagnostics.
///
/// Rules are stateless and must be `Send + Sync` so they can be shared
/// across threads.
pub trait ValidationRule<S: ?Sized>: Send + Sync {
    /// Short, stable identifier for this rule (e.g., `"chain_shape"`).
    fn name(&self) -> &str;

    /// Inspect `subject` and return any findings.
    fn validate(&self, subject: &S) -> Vec<ValidationDiagnostic>;
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Runs a set of [`ValidationRule`]s and collects all diagnostics into a
/// [`ValidationReport`].
pub struct ValidationEngine<S: ?Sized> {
    rules: Vec<Box<dyn ValidationRule<S>>>,
}

impl<S: ?Sized> ValidationEngine<S> {
    /// Create an empty engine with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register an additional rule.
    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule<S>>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run all rules against `subject` and return the collected report.
    pub fn validate(&self, subject: &S) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            report.diagnostics.extend(rule.validate(subject));
        }
        report
    }
}

impl<S: ?Sized> fmt::Debug for ValidationEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl ValidationEngine<ChainPlan> {
    /// Engine pre-loaded with the default chain rules.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(NonEmptyRule));
        engine.add_rule(Box::new(SourceShapeRule));
        engine.add_rule(Box::new(ChainShapeRule));
        engine.add_rule(Box::new(RedundantStageRule));
        engine
    }
}

impl Default for ValidationEngine<ChainPlan> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ValidationEngine<PipelineSpec> {
    /// Engine pre-loaded with the default spec rules.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(VersionRule));
        engine.add_rule(Box::new(TableIdRule));
        engine.add_rule(Box::new(LowerCaseShapeRule));
        engine.add_rule(Box::new(RuntimeLimitsRule));
        engine.add_rule(Box::new(UnknownFieldsRule));
        engine
    }
}

impl Default for ValidationEngine<PipelineSpec> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Chain plan
// ═══════════════════════════════════════════════════════════════════════════

/// Declared signature of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSignature {
    pub name: &'static str,
    pub input: Shape,
    pub output: Shape,
    pub idempotent: bool,
}

impl StageSignature {
    pub fn of(stage: &dyn Stage) -> Self {
        Self {
            name: stage.name(),
            input: stage.input_shape(),
            output: stage.output_shape(),
            idempotent: stage.is_idempotent(),
        }
    }
}

/// Shapes of a stage list plus the shape fed into the first stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainPlan {
    pub source: Shape,
    pub stages: Vec<StageSignature>,
}

impl ChainPlan {
    /// Plan for stages fed with raw document text.
    pub fn from_stages(stages: &[Arc<dyn Stage>]) -> Self {
        Self {
            source: Shape::Text,
            stages: stages.iter().map(|s| StageSignature::of(s.as_ref())).collect(),
        }
    }
}

// ─── 1. At least one stage ──────────────────────────────────────────────────

struct NonEmptyRule;

impl ValidationRule<ChainPlan> for NonEmptyRule {
    fn name(&self) -> &str {
        "non_empty"
    }

    fn validate(&self, plan: &ChainPlan) -> Vec<ValidationDiagnostic> {
        if plan.stages.is_empty() {
            vec![ValidationDiagnostic::error(
                PipelineSpecError::new(
                    ErrorCode::EmptyPipeline,
                    "/stages",
                    "a pipeline needs at least one stage",
                )
                .with_hint("Start with a tokenizer"),
            )]
        } else {
            vec![]
        }
    }
}

// ─── 2. First stage must accept the document source ─────────────────────────

struct SourceShapeRule;

impl ValidationRule<ChainPlan> for SourceShapeRule {
    fn name(&self) -> &str {
        "source_shape"
    }

    fn validate(&self, plan: &ChainPlan) -> Vec<ValidationDiagnostic> {
        let Some(first) = plan.stages.first() else {
            return vec![];
        };
        if first.input == plan.source {
            return vec![];
        }

        let link = ChainTypeError {
            position: 0,
            upstream: DOCUMENT_SOURCE.to_string(),
            downstream: first.name.to_string(),
            produced: plan.source,
            expected: first.input,
        };
        vec![ValidationDiagnostic::error(
            PipelineSpecError::new(
                ErrorCode::InputMismatch,
                "/stages/0",
                format!(
                    "`{}` expects {} but documents provide {}",
                    first.name, first.input, plan.source
                ),
            )
            .with_hint(hint_for(plan.source, first.input))
            .with_link(link),
        )]
    }
}

// ─── 3. Adjacent shapes must agree ──────────────────────────────────────────

struct ChainShapeRule;

impl ValidationRule<ChainPlan> for ChainShapeRule {
    fn name(&self) -> &str {
        "chain_shape"
    }

    fn validate(&self, plan: &ChainPlan) -> Vec<ValidationDiagnostic> {
        plan.stages
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].output != pair[1].input)
            .map(|(i, pair)| {
                let (up, down) = (&pair[0], &pair[1]);
                let position = i + 1;
                let link = ChainTypeError {
                    position,
                    upstream: up.name.to_string(),
                    downstream: down.name.to_string(),
                    produced: up.output,
                    expected: down.input,
                };
                ValidationDiagnostic::error(
                    PipelineSpecError::new(
                        ErrorCode::ChainMismatch,
                        format!("/stages/{position}"),
                        format!(
                            "`{}` produces {} but `{}` expects {}",
                            up.name, up.output, down.name, down.input
                        ),
                    )
                    .with_hint(hint_for(up.output, down.input))
                    .with_link(link),
                )
            })
            .collect()
    }
}

fn hint_for(produced: Shape, expected: Shape) -> String {
    match (produced, expected) {
        (Shape::Text, Shape::TokenSequence) => format!("Insert a {STAGE_TOKENIZER} before this stage"),
        (Shape::StructuredRecord, _) => format!("{STAGE_POST_PROCESSOR} must be the last stage"),
        _ => "Reorder the stages so each output feeds a matching input".to_string(),
    }
}

// ─── 4. Back-to-back idempotent stages (warning) ────────────────────────────

struct RedundantStageRule;

impl ValidationRule<ChainPlan> for RedundantStageRule {
    fn name(&self) -> &str {
        "redundant_stage"
    }

    fn validate(&self, plan: &ChainPlan) -> Vec<ValidationDiagnostic> {
        plan.stages
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0] == pair[1] && pair[1].idempotent)
            .map(|(i, pair)| {
                ValidationDiagnostic::warning(
                    PipelineSpecError::new(
                        ErrorCode::RedundantStage,
                        format!("/stages/{}", i + 1),
                        format!("`{}` repeats the previous stage and has no effect", pair[1].name),
                    )
                    .with_hint("Remove the duplicate stage"),
                )
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Spec rules
// ═══════════════════════════════════════════════════════════════════════════

// ─── 1. Supported version ───────────────────────────────────────────────────

struct VersionRule;

impl ValidationRule<PipelineSpec> for VersionRule {
    fn name(&self) -> &str {
        "version"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        if spec.v == SPEC_VERSION {
            return vec![];
        }
        vec![ValidationDiagnostic::error(
            PipelineSpecError::new(
                ErrorCode::UnsupportedVersion,
                "/v",
                format!("unsupported spec version {}", spec.v),
            )
            .with_hint(format!("Set \"v\": {SPEC_VERSION}")),
        )]
    }
}

// ─── 2. Table stages need a table id ────────────────────────────────────────

struct TableIdRule;

impl ValidationRule<PipelineSpec> for TableIdRule {
    fn name(&self) -> &str {
        "table_id"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        spec.stages
            .iter()
            .enumerate()
            .filter_map(|(i, stage)| match stage {
                StageSpec::SpellingMapper { table } | StageSpec::Lemmatizer { table }
                    if table.trim().is_empty() =>
                {
                    Some(ValidationDiagnostic::error(
                        PipelineSpecError::new(
                            ErrorCode::MissingTable,
                            format!("/stages/{i}/table"),
                            format!("{} requires a table", stage.kind_name()),
                        )
                        .with_hint("Set \"table\" to a CSV path or registered table id"),
                    ))
                }
                _ => None,
            })
            .collect()
    }
}

// ─── 3. to_lower_case only works on textual shapes ──────────────────────────

struct LowerCaseShapeRule;

impl ValidationRule<PipelineSpec> for LowerCaseShapeRule {
    fn name(&self) -> &str {
        "lower_case_shape"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        spec.stages
            .iter()
            .enumerate()
            .filter_map(|(i, stage)| match stage {
                StageSpec::ToLowerCase { shape: Some(shape) } if !shape.is_textual() => {
                    Some(ValidationDiagnostic::error(
                        PipelineSpecError::new(
                            ErrorCode::InvalidStage,
                            format!("/stages/{i}/shape"),
                            format!("to_lower_case cannot operate on {shape}"),
                        )
                        .with_hint("Use \"text\" or \"token_sequence\", or omit the shape"),
                    ))
                }
                _ => None,
            })
            .collect()
    }
}

// ─── 4. Runtime and executor limits must be positive when set ───────────────

struct RuntimeLimitsRule;

impl ValidationRule<PipelineSpec> for RuntimeLimitsRule {
    fn name(&self) -> &str {
        "runtime_limits"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let checks: &[(&str, Option<usize>)] = &[
            ("/runtime/max_tokens", spec.runtime.max_tokens),
            ("/executor/workers", spec.executor.workers),
            ("/executor/queue_capacity", Some(spec.executor.queue_capacity)),
        ];

        checks
            .iter()
            .filter(|(_, value)| *value == Some(0))
            .map(|&(path, _)| {
                ValidationDiagnostic::error(
                    PipelineSpecError::new(
                        ErrorCode::LimitExceeded,
                        path,
                        format!("{path} must be greater than 0"),
                    )
                    .with_hint("Remove the field to use the default, or set a positive value"),
                )
            })
            .collect()
    }
}

// ─── 5. Unknown fields (strict → error, non-strict → warning) ──────────────

struct UnknownFieldsRule;

impl UnknownFieldsRule {
    /// Collect unknown-field diagnostics at the given JSON pointer `path`
    /// from a `HashMap` of extra fields captured by `#[serde(flatten)]`.
    fn check_unknowns(
        path: &str,
        unknowns: &HashMap<String, serde_json::Value>,
        strict: bool,
    ) -> Vec<ValidationDiagnostic> {
        let mut keys: Vec<&String> = unknowns.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let diag_fn = if strict {
                    ValidationDiagnostic::error
                } else {
                    ValidationDiagnostic::warning
                };
                diag_fn(
                    PipelineSpecError::new(
                        ErrorCode::UnknownField,
                        format!("{path}/{key}"),
                        format!("unrecognized field \"{key}\""),
                    )
                    .with_hint("Check spelling or remove this field"),
                )
            })
            .collect()
    }
}

impl ValidationRule<PipelineSpec> for UnknownFieldsRule {
    fn name(&self) -> &str {
        "unknown_fields"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        out.extend(Self::check_unknowns("", &spec.unknown_fields, spec.strict));
        out.extend(Self::check_unknowns(
            "/runtime",
            &spec.runtime.unknown_fields,
            spec.strict,
        ));
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════
