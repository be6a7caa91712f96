//! Values flowing between pipeline stages.
//!
//! A [`StageValue`] is what one stage hands to the next; its [`Shape`] is the
//! structural tag stages declare for their input and output, and the tag the
//! builder compares when linking stages together.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured export record produced by the post-processor.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Structural type of a [`StageValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// A single string.
    Text,
    /// Ordered word tokens; duplicates allowed.
    TokenSequence,
    /// Field name to value mapping; terminal export shape only.
    StructuredRecord,
}

impl Shape {
    /// Returns the user-facing name used in JSON and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::TokenSequence => "token_sequence",
            Self::StructuredRecord => "structured_record",
        }
    }

    /// `true` for shapes whose content is plain strings.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::TokenSequence)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value in transit between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum StageValue {
    Text(String),
    TokenSequence(Vec<String>),
    StructuredRecord(Record),
}

impl StageValue {
    pub fn shape(&self) -> Shape {
        match self {
            Self::Text(_) => Shape::Text,
            Self::TokenSequence(_) => Shape::TokenSequence,
            Self::StructuredRecord(_) => Shape::StructuredRecord,
        }
    }

    /// Number of items carried: tokens, record fields, or 1 for text.
    pub fn item_count(&self) -> usize {
        match self {
            Self::Text(_) => 1,
            Self::TokenSequence(tokens) => tokens.len(),
            Self::StructuredRecord(record) => record.len(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_tokens(&self) -> Option<&[String]> {
        match self {
            Self::TokenSequence(tokens) => Some(tokens),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::StructuredRecord(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_tokens(self) -> Option<Vec<String>> {
        match self {
            Self::TokenSequence(tokens) => Some(tokens),
            _ => None,
        }
    }
}

impl From<String> for StageValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for StageValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for StageValue {
    fn from(tokens: Vec<String>) -> Self {
        Self::TokenSequence(tokens)
    }
}
