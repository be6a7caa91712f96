//! # rapid-textnorm
//!
//! Composable text normalization pipelines.
//!
//! A pipeline is an ordered chain of stages (tokenizer, case folding,
//! spelling and lemma tables, Porter stemmer, record export). Each stage
//! declares the [`Shape`] it consumes and produces; adjacent shapes are
//! checked once when the pipeline is built, so a mis-ordered chain fails
//! before any document is processed. A built [`Pipeline`] is immutable and
//! shared by every worker of a [`BatchExecutor`].
//!
//! ## Example
//!
//! ```
//! use rapid_textnorm::prelude::*;
//!
//! let spelling = MappingTable::from_pairs(TableKind::Spelling, [("color", "colour")])?.shared();
//! let lemmas = MappingTable::from_pairs(TableKind::Lemma, [("running", "run")])?.shared();
//!
//! let pipeline = Pipeline::builder()
//!     .stage(Tokenizer::new())
//!     .stage(ToLowerCase::new())
//!     .stage(TableSubstitution::spelling_mapper(spelling)?)
//!     .stage(TableSubstitution::lemmatizer(lemmas)?)
//!     .build()?;
//!
//! let out = pipeline.process_text("Running is my Favorite COLOR")?;
//! assert_eq!(out.as_tokens().unwrap(), ["run", "is", "my", "favorite", "colour"]);
//! # Ok::<(), rapid_textnorm::PipelineError>(())
//! ```

pub mod error_code;
pub mod errors;
pub mod nlp;
pub mod pipeline;
pub mod stages;
pub mod table;
pub mod types;

pub use error_code::ErrorCode;
pub use errors::{ChainTypeError, MalformedTableError, PipelineError, PipelineSpecError, Result};
pub use pipeline::artifacts::{Shape, StageValue};
pub use pipeline::executor::{BatchExecutor, BatchResults, ExecutorConfig, FailurePolicy, ResultOrder};
pub use pipeline::runner::{Pipeline, PipelineBuilder};
pub use pipeline::spec::PipelineSpec;
pub use pipeline::traits::Stage;
pub use types::{Document, ResultItem};

/// Common imports.
pub mod prelude {
    pub use crate::errors::PipelineError;
    pub use crate::pipeline::artifacts::{Shape, StageValue};
    pub use crate::pipeline::executor::{BatchExecutor, ExecutorConfig, FailurePolicy, ResultOrder};
    pub use crate::pipeline::runner::Pipeline;
    pub use crate::pipeline::spec::PipelineSpec;
    pub use crate::pipeline::traits::Stage;
    pub use crate::stages::{
        PorterStemmer, PostProcessor, PreProcessor, TableSubstitution, ToLowerCase, Tokenizer,
    };
    pub use crate::table::loader::CsvTableLoader;
    pub use crate::table::{MappingTable, TableKind, TableRegistry};
    pub use crate::types::{Document, ResultItem};
}
