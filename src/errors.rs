//! Error types.
//!
//! [`PipelineError`] is the single error type returned by the public API.
//! Construction-time variants (`Configuration`, `Validation`, `ChainType`,
//! `MalformedTable`, `TableIo`) abort pipeline creation; per-document
//! variants (`StageMismatch`, `Processing`) are attached to the
//! [`ResultItem`](crate::types::ResultItem) of the document that failed.
//!
//! [`PipelineSpecError`] is the structured diagnostic emitted by the
//! validation engine (code, JSON-pointer path, message, hint).

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::error_code::ErrorCode;
use crate::pipeline::artifacts::Shape;
use crate::table::TableKind;

/// Convenience alias used throughout the crate.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

// ─── PipelineError ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Empty or otherwise invalid pipeline definition.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A validation rule rejected the pipeline or its spec. Keeps the
    /// diagnostic, so [`PipelineError::code`] reports the rule's code.
    #[error("configuration error: {0}")]
    Validation(PipelineSpecError),

    /// Two linked stages disagree on the shape flowing between them.
    #[error(transparent)]
    ChainType(#[from] ChainTypeError),

    /// Table data could not be turned into a [`MappingTable`](crate::table::MappingTable).
    #[error(transparent)]
    MalformedTable(#[from] MalformedTableError),

    /// A table file could not be opened or read.
    #[error("failed to read table {}: {source}", path.display())]
    TableIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stage received a value whose runtime shape differs from the shape
    /// validated at build time. Indicates an internal invariant violation.
    #[error("stage `{stage}` expected {expected} input but received {found}")]
    StageMismatch {
        stage: &'static str,
        expected: Shape,
        found: Shape,
    },

    /// A stage could not transform this particular document.
    #[error("stage `{stage}` failed: {reason}")]
    Processing { stage: &'static str, reason: String },
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::Processing`] failure.
    pub fn processing(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Processing {
            stage,
            reason: reason.into(),
        }
    }

    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::InvalidStage,
            Self::Validation(diag) => diag.code,
            Self::ChainType(e) if e.position == 0 && e.upstream == DOCUMENT_SOURCE => {
                ErrorCode::InputMismatch
            }
            Self::ChainType(_) => ErrorCode::ChainMismatch,
            Self::MalformedTable(_) => ErrorCode::MalformedTable,
            Self::TableIo { .. } => ErrorCode::TableIo,
            Self::StageMismatch { .. } => ErrorCode::StageMismatch,
            Self::Processing { .. } => ErrorCode::ProcessingFailed,
        }
    }

    /// `true` for errors that can only occur while building a pipeline.
    pub fn is_construction_error(&self) -> bool {
        !matches!(self, Self::StageMismatch { .. } | Self::Processing { .. })
    }
}

/// Name used for the virtual upstream that feeds raw document text into the
/// first stage.
pub const DOCUMENT_SOURCE: &str = "document";

// ─── ChainTypeError ─────────────────────────────────────────────────────────

/// The first adjacent pair whose output/input shapes disagree.
///
/// `position` is the index of the downstream stage. A mismatch between the
/// raw document text and the first stage is reported at position `0` with
/// [`DOCUMENT_SOURCE`] as the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error(
    "stage {position} (`{downstream}`) expects {expected} but `{upstream}` produces {produced}"
)]
pub struct ChainTypeError {
    pub position: usize,
    pub upstream: String,
    pub downstream: String,
    pub produced: Shape,
    pub expected: Shape,
}

// ─── MalformedTableError ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MalformedTableError {
    /// The same key was given two different values.
    #[error("{table} table: key `{key}` maps to both `{first}` and `{second}`")]
    ConflictingKey {
        table: TableKind,
        key: String,
        first: String,
        second: String,
    },

    /// A row lacks a required column, or the column is blank.
    #[error("{table} table: row {row} is missing required field `{field}`")]
    MissingField {
        table: TableKind,
        row: usize,
        field: &'static str,
    },

    /// The underlying CSV could not be parsed.
    #[error("{table} table: {source}")]
    Csv {
        table: TableKind,
        #[source]
        source: csv::Error,
    },
}

// ─── PipelineSpecError ──────────────────────────────────────────────────────

/// A structured validation finding: code, location, message and an optional
/// fix-it hint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSpecError {
    pub code: ErrorCode,
    /// JSON pointer into the pipeline definition (e.g. `/stages/2`).
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// The offending link, for chain-shape findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ChainTypeError>,
}

impl PipelineSpecError {
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
            link: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_link(mut self, link: ChainTypeError) -> Self {
        self.link = Some(link);
        self
    }
}

impl fmt::Display for PipelineSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.path, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

impl std::error::Error for PipelineSpecError {}

impl From<PipelineSpecError> for PipelineError {
    fn from(mut err: PipelineSpecError) -> Self {
        match err.link.take() {
            Some(link) => PipelineError::ChainType(link),
            None => PipelineError::Validation(err),
        }
    }
}
