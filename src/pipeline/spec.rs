//! Pipeline specification types.
//!
//! A [`PipelineSpec`] lists the stages of a normalization pipeline, the
//! runtime limits, the batch executor settings and strictness. It is
//! validated by [`super::validation::ValidationEngine`] and then resolved
//! into a [`Pipeline`] against a [`TableResolver`].
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "v": 1,
//!   "stages": [
//!     { "kind": "tokenizer" },
//!     { "kind": "to_lower_case" },
//!     { "kind": "spelling_mapper", "table": "tables/spelling.csv" },
//!     { "kind": "lemmatizer", "table": "tables/lemmas.csv" },
//!     { "kind": "porter_stemmer" }
//!   ],
//!   "runtime": { "max_tokens": 200000 },
//!   "executor": { "workers": 4, "failure_policy": "isolate", "order": "submission" },
//!   "strict": false
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::artifacts::Shape;
use super::executor::{BatchExecutor, ExecutorConfig};
use super::runner::Pipeline;
use super::traits::{
    Stage, STAGE_LEMMATIZER, STAGE_PORTER_STEMMER, STAGE_POST_PROCESSOR, STAGE_PRE_PROCESSOR,
    STAGE_SPELLING_MAPPER, STAGE_TO_LOWER_CASE, STAGE_TOKENIZER,
};
use super::validation::{ValidationEngine, ValidationReport};
use crate::errors::PipelineError;
use crate::stages::{
    PorterStemmer, PostProcessor, PreProcessor, TableSubstitution, ToLowerCase, Tokenizer,
};
use crate::table::{MappingTable, TableKind, TableResolver};

/// The only spec version understood by this crate.
pub const SPEC_VERSION: u32 = 1;

/// Top-level pipeline specification (v1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Spec version (currently `1`).
    pub v: u32,

    /// Stages in execution order.
    #[serde(default)]
    pub stages: Vec<StageSpec>,

    /// Runtime execution limits.
    #[serde(default)]
    pub runtime: RuntimeSpec,

    /// Batch executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// If `true`, unrecognized fields are errors; if `false`, warnings.
    #[serde(default)]
    pub strict: bool,

    /// Captures any fields not recognized by the schema.
    /// Used by the strict-mode validation rule.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

/// One stage entry, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageSpec {
    PreProcessor,
    Tokenizer,
    /// `shape` defaults to the output shape of the preceding stage.
    ToLowerCase {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shape: Option<Shape>,
    },
    /// `table` is an id understood by the resolver (a CSV path for
    /// [`CsvTableLoader`](crate::table::loader::CsvTableLoader)).
    SpellingMapper { table: String },
    Lemmatizer { table: String },
    PorterStemmer,
    PostProcessor,
}

impl StageSpec {
    /// Returns the user-facing name used in JSON and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::PreProcessor => STAGE_PRE_PROCESSOR,
            Self::Tokenizer => STAGE_TOKENIZER,
            Self::ToLowerCase { .. } => STAGE_TO_LOWER_CASE,
            Self::SpellingMapper { .. } => STAGE_SPELLING_MAPPER,
            Self::Lemmatizer { .. } => STAGE_LEMMATIZER,
            Self::PorterStemmer => STAGE_PORTER_STEMMER,
            Self::PostProcessor => STAGE_POST_PROCESSOR,
        }
    }
}

/// Runtime execution limits (fail-fast guards).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Maximum number of tokens per document; larger documents fail alone.
    #[serde(default)]
    pub max_tokens: Option<usize>,

    /// Captures any fields not recognized by the schema.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl PipelineSpec {
    /// Parse a spec from JSON.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::Configuration(format!("invalid pipeline spec: {e}")))
    }

    /// Run the default spec rules.
    pub fn validate(&self) -> ValidationReport {
        ValidationEngine::<PipelineSpec>::with_defaults().validate(self)
    }

    /// Validate, resolve tables and link the stages.
    ///
    /// Each distinct `(kind, table)` pair is resolved once and shared by
    /// every stage that names it.
    pub fn build(&self, resolver: &dyn TableResolver) -> Result<Pipeline, PipelineError> {
        if let Some(err) = self.validate().into_first_error() {
            return Err(err.into());
        }

        let mut tables: FxHashMap<(TableKind, &str), Arc<MappingTable>> = FxHashMap::default();
        let mut stages: Vec<Arc<dyn Stage>> = Vec::with_capacity(self.stages.len());
        let mut upstream = Shape::Text;

        for spec in &self.stages {
            let stage: Arc<dyn Stage> = match spec {
                StageSpec::PreProcessor => Arc::new(PreProcessor),
                StageSpec::Tokenizer => Arc::new(match self.runtime.max_tokens {
                    Some(limit) => Tokenizer::new().with_max_tokens(limit),
                    None => Tokenizer::new(),
                }),
                StageSpec::ToLowerCase { shape } => {
                    // A record upstream is left for the chain check to report.
                    let inferred = if upstream.is_textual() {
                        upstream
                    } else {
                        Shape::TokenSequence
                    };
                    Arc::new(ToLowerCase::for_shape(shape.unwrap_or(inferred))?)
                }
                StageSpec::SpellingMapper { table } => Arc::new(TableSubstitution::spelling_mapper(
                    resolve_cached(&mut tables, resolver, TableKind::Spelling, table)?,
                )?),
                StageSpec::Lemmatizer { table } => Arc::new(TableSubstitution::lemmatizer(
                    resolve_cached(&mut tables, resolver, TableKind::Lemma, table)?,
                )?),
                StageSpec::PorterStemmer => Arc::new(PorterStemmer),
                StageSpec::PostProcessor => Arc::new(PostProcessor),
            };
            upstream = stage.output_shape();
            stages.push(stage);
        }

        Pipeline::builder().stages(stages).build()
    }

    /// Build the pipeline and wrap it in a [`BatchExecutor`] configured by
    /// the `executor` section.
    pub fn executor(&self, resolver: &dyn TableResolver) -> Result<BatchExecutor, PipelineError> {
        let pipeline = self.build(resolver)?;
        BatchExecutor::with_config(pipeline, self.executor.clone())
    }
}

fn resolve_cached<'a>(
    cache: &mut FxHashMap<(TableKind, &'a str), Arc<MappingTable>>,
    resolver: &dyn TableResolver,
    kind: TableKind,
    id: &'a str,
) -> Result<Arc<MappingTable>, PipelineError> {
    if let Some(table) = cache.get(&(kind, id)) {
        return Ok(Arc::clone(table));
    }
    let table = resolver.resolve(kind, id)?;
    cache.insert((kind, id), Arc::clone(&table));
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::executor::{FailurePolicy, ResultOrder};
    use crate::table::TableRegistry;

    fn registry() -> TableRegistry {
        TableRegistry::new()
            .with_table(
                "us_uk",
                MappingTable::from_pairs(TableKind::Spelling, [("color", "colour")]).unwrap(),
            )
            .with_table(
                "lemmas",
                MappingTable::from_pairs(TableKind::Lemma, [("running", "run")]).unwrap(),
            )
    }

    #[test]
    fn test_deserialize_minimal_spec() {
        let spec = PipelineSpec::from_json(r#"{ "v": 1 }"#).unwrap();
        assert_eq!(spec.v, 1);
        assert!(spec.stages.is_empty());
        assert!(spec.runtime.max_tokens.is_none());
        assert_eq!(spec.executor, ExecutorConfig::default());
        assert!(!spec.strict);
    }

    #[test]
    fn test_deserialize_full_spec() {
        let json = r#"{
            "v": 1,
            "stages": [
                { "kind": "pre_processor" },
                { "kind": "tokenizer" },
                { "kind": "to_lower_case", "shape": "token_sequence" },
                { "kind": "spelling_mapper", "table": "us_uk" },
                { "kind": "lemmatizer", "table": "lemmas" },
                { "kind": "porter_stemmer" },
                { "kind": "post_processor" }
            ],
            "runtime": { "max_tokens": 100000 },
            "executor": { "workers": 2, "failure_policy": "halt", "order": "completion" },
            "strict": true
        }"#;
        let spec = PipelineSpec::from_json(json).unwrap();
        assert_eq!(spec.stages.len(), 7);
        assert_eq!(
            spec.stages[2],
            StageSpec::ToLowerCase {
                shape: Some(Shape::TokenSequence)
            }
        );
        assert_eq!(spec.runtime.max_tokens, Some(100000));
        assert_eq!(spec.executor.workers, Some(2));
        assert_eq!(spec.executor.failure_policy, FailurePolicy::Halt);
        assert_eq!(spec.executor.order, ResultOrder::Completion);
        assert!(spec.strict);
    }

    #[test]
    fn test_unknown_stage_kind_is_rejected() {
        let err = PipelineSpec::from_json(r#"{ "v": 1, "stages": [{ "kind": "soundex" }] }"#)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_unknown_fields_captured() {
        let spec = PipelineSpec::from_json(
            r#"{ "v": 1, "bogus_top_level": 42, "runtime": { "max_nodes": 5 } }"#,
        )
        .unwrap();
        assert!(spec.unknown_fields.contains_key("bogus_top_level"));
        assert!(spec.runtime.unknown_fields.contains_key("max_nodes"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = r#"{"v":1,"stages":[{"kind":"tokenizer"},{"kind":"lemmatizer","table":"lemmas"}]}"#;
        let spec = PipelineSpec::from_json(json).unwrap();
        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["stages"][0]["kind"], "tokenizer");
        assert_eq!(back["stages"][1]["table"], "lemmas");
    }

    #[test]
    fn test_build_resolves_tables_and_runs() {
        let spec = PipelineSpec::from_json(
            r#"{ "v": 1, "stages": [
                { "kind": "tokenizer" },
                { "kind": "to_lower_case" },
                { "kind": "spelling_mapper", "table": "us_uk" },
                { "kind": "lemmatizer", "table": "lemmas" }
            ] }"#,
        )
        .unwrap();
        let pipeline = spec.build(&registry()).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["tokenizer", "to_lower_case", "spelling_mapper", "lemmatizer"]
        );
        let out = pipeline.process_text("Running is my Favorite COLOR").unwrap();
        assert_eq!(
            out.as_tokens().unwrap(),
            ["run", "is", "my", "favorite", "colour"]
        );
    }

    #[test]
    fn test_lower_case_shape_follows_upstream() {
        let spec = PipelineSpec::from_json(
            r#"{ "v": 1, "stages": [{ "kind": "to_lower_case" }, { "kind": "tokenizer" }] }"#,
        )
        .unwrap();
        let pipeline = spec.build(&registry()).unwrap();
        assert_eq!(pipeline.input_shape(), Some(Shape::Text));
        let out = pipeline.process_text("ONE Two").unwrap();
        assert_eq!(out.as_tokens().unwrap(), ["one", "two"]);
    }

    #[test]
    fn test_max_tokens_reaches_tokenizer() {
        let spec = PipelineSpec::from_json(
            r#"{ "v": 1, "stages": [{ "kind": "tokenizer" }], "runtime": { "max_tokens": 2 } }"#,
        )
        .unwrap();
        let pipeline = spec.build(&registry()).unwrap();
        assert!(pipeline.process_text("a b").is_ok());
        let err = pipeline.process_text("a b c").unwrap_err();
        assert!(matches!(err, PipelineError::Processing { stage: "tokenizer", .. }));
    }

    #[test]
    fn test_missing_table_fails_build() {
        let spec = PipelineSpec::from_json(
            r#"{ "v": 1, "stages": [{ "kind": "tokenizer" }, { "kind": "lemmatizer", "table": "nope" }] }"#,
        )
        .unwrap();
        let err = spec.build(&registry()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(err.code(), crate::ErrorCode::MissingTable);
    }

    #[test]
    fn test_chain_error_surfaces_from_build() {
        let spec = PipelineSpec::from_json(
            r#"{ "v": 1, "stages": [{ "kind": "tokenizer" }, { "kind": "tokenizer" }] }"#,
        )
        .unwrap();
        match spec.build(&registry()) {
            Err(PipelineError::ChainType(e)) => {
                assert_eq!(e.position, 1);
                assert_eq!(e.produced, Shape::TokenSequence);
                assert_eq!(e.expected, Shape::Text);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_invalid_spec_fails_before_resolving_tables() {
        struct PanickingResolver;
        impl TableResolver for PanickingResolver {
            fn resolve(&self, _: TableKind, _: &str) -> Result<Arc<MappingTable>, PipelineError> {
                panic!("resolver must not be called");
            }
        }

        let spec = PipelineSpec::from_json(
            r#"{ "v": 2, "stages": [{ "kind": "lemmatizer", "table": "lemmas" }] }"#,
        )
        .unwrap();
        let err = spec.build(&PanickingResolver).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(err.code(), crate::ErrorCode::UnsupportedVersion);
    }

    #[test]
    fn test_shared_table_resolved_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingResolver {
            inner: TableRegistry,
            calls: AtomicUsize,
        }
        impl TableResolver for CountingResolver {
            fn resolve(&self, kind: TableKind, id: &str) -> Result<Arc<MappingTable>, PipelineError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.inner.resolve(kind, id)
            }
        }

        let resolver = CountingResolver {
            inner: registry(),
            calls: AtomicUsize::new(0),
        };
        let spec = PipelineSpec::from_json(
            r#"{ "v": 1, "stages": [
                { "kind": "tokenizer" },
                { "kind": "lemmatizer", "table": "lemmas" },
                { "kind": "lemmatizer", "table": "lemmas" }
            ] }"#,
        )
        .unwrap();
        spec.build(&resolver).unwrap();
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_executor_from_spec() {
        let spec = PipelineSpec::from_json(
            r#"{ "v": 1, "stages": [{ "kind": "tokenizer" }], "executor": { "workers": 1 } }"#,
        )
        .unwrap();
        let executor = spec.executor(&registry()).unwrap();
        assert_eq!(executor.config().workers, Some(1));
    }
}
