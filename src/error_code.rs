//! Stable, machine-readable error codes.
//!
//! Every [`PipelineError`](crate::errors::PipelineError) and every validation
//! diagnostic carries one of these codes. The serialized form (`snake_case`)
//! is part of the public contract and does not change between releases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error / diagnostic classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The stage list is empty.
    EmptyPipeline,
    /// Adjacent stages disagree on the shape flowing between them.
    ChainMismatch,
    /// The first stage cannot consume raw document text.
    InputMismatch,
    /// A stage is repeated back-to-back with no effect.
    RedundantStage,
    /// A stage or spec option is invalid on its own.
    InvalidStage,
    /// A table identifier is missing or cannot be resolved.
    MissingTable,
    /// Table data is malformed (conflicting keys, missing fields, bad CSV).
    MalformedTable,
    /// A table file could not be read.
    TableIo,
    /// A runtime limit is zero or was exceeded.
    LimitExceeded,
    /// A field in the pipeline spec is not recognized.
    UnknownField,
    /// The spec version is not supported.
    UnsupportedVersion,
    /// A value reached a stage with the wrong runtime shape.
    StageMismatch,
    /// A stage could not transform a specific document.
    ProcessingFailed,
    /// Generic validation failure (custom rules).
    ValidationFailed,
}

impl ErrorCode {
    /// Returns the serialized name used in JSON and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyPipeline => "empty_pipeline",
            Self::ChainMismatch => "chain_mismatch",
            Self::InputMismatch => "input_mismatch",
            Self::RedundantStage => "redundant_stage",
            Self::InvalidStage => "invalid_stage",
            Self::MissingTable => "missing_table",
            Self::MalformedTable => "malformed_table",
            Self::TableIo => "table_io",
            Self::LimitExceeded => "limit_exceeded",
            Self::UnknownField => "unknown_field",
            Self::UnsupportedVersion => "unsupported_version",
            Self::StageMismatch => "stage_mismatch",
            Self::ProcessingFailed => "processing_failed",
            Self::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
