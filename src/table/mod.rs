//! Mapping tables for spelling canonicalization and lemma lookup.
//!
//! A [`MappingTable`] is built once from key→value pairs and is read-only
//! afterwards; stages hold it behind an `Arc` so every worker of a batch
//! shares the same instance without locking. Lookups are exact and
//! case-sensitive: put a `to_lower_case` stage first if the table is
//! lowercase.

pub mod loader;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error_code::ErrorCode;
use crate::errors::{MalformedTableError, PipelineError, PipelineSpecError};

// ─── TableKind ──────────────────────────────────────────────────────────────

/// What a table maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Surface spelling → canonical spelling.
    Spelling,
    /// Inflected form → lemma.
    Lemma,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spelling => "spelling",
            Self::Lemma => "lemma",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a key is inserted twice with different values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`MalformedTableError::ConflictingKey`].
    #[default]
    Reject,
    /// Keep the value seen first.
    KeepFirst,
}

// ─── MappingTable ───────────────────────────────────────────────────────────

/// Immutable key → canonical-value lookup.
#[derive(Debug, Clone)]
pub struct MappingTable {
    kind: TableKind,
    entries: FxHashMap<String, String>,
}

impl MappingTable {
    /// Build a table from pairs, rejecting conflicting duplicates and blank
    /// keys or values.
    pub fn from_pairs<I, K, V>(kind: TableKind, pairs: I) -> Result<Self, MalformedTableError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut builder = MappingTableBuilder::new(kind);
        for (row, (key, value)) in pairs.into_iter().enumerate() {
            builder.insert_row(row + 1, key.into(), value.into())?;
        }
        Ok(builder.build())
    }

    pub fn builder(kind: TableKind) -> MappingTableBuilder {
        MappingTableBuilder::new(kind)
    }

    /// The mapped value for `word`, or `None` if `word` is not a key.
    ///
    /// A miss is not an error: callers keep the word unchanged.
    pub fn lookup(&self, word: &str) -> Option<&str> {
        self.entries.get(word).map(String::as_str)
    }

    pub fn contains_key(&self, word: &str) -> bool {
        self.entries.contains_key(word)
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Wrap in an `Arc` for sharing between stages.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

// ─── MappingTableBuilder ────────────────────────────────────────────────────

/// Incremental construction with duplicate handling and row tracking.
#[derive(Debug)]
pub struct MappingTableBuilder {
    kind: TableKind,
    policy: DuplicatePolicy,
    entries: FxHashMap<String, String>,
    rows: usize,
}

impl MappingTableBuilder {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            policy: DuplicatePolicy::default(),
            entries: FxHashMap::default(),
            rows: 0,
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Insert a pair, numbering rows automatically (1-based).
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MalformedTableError> {
        let row = self.rows + 1;
        self.insert_row(row, key.into(), value.into())
    }

    /// Insert a pair that came from source row `row` (used in error reports).
    pub fn insert_row(
        &mut self,
        row: usize,
        key: String,
        value: String,
    ) -> Result<(), MalformedTableError> {
        self.rows = self.rows.max(row);

        if key.trim().is_empty() {
            return Err(self.missing(row, "key"));
        }
        if value.trim().is_empty() {
            return Err(self.missing(row, "value"));
        }

        match self.entries.get(&key) {
            None => {
                self.entries.insert(key, value);
                Ok(())
            }
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => match self.policy {
                DuplicatePolicy::KeepFirst => Ok(()),
                DuplicatePolicy::Reject => Err(MalformedTableError::ConflictingKey {
                    table: self.kind,
                    first: existing.clone(),
                    key,
                    second: value,
                }),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> MappingTable {
        MappingTable {
            kind: self.kind,
            entries: self.entries,
        }
    }

    fn missing(&self, row: usize, field: &'static str) -> MalformedTableError {
        MalformedTableError::MissingField {
            table: self.kind,
            row,
            field,
        }
    }
}

// ─── Resolution ─────────────────────────────────────────────────────────────

/// Turns a table identifier from a pipeline spec into a loaded table.
pub trait TableResolver {
    fn resolve(&self, kind: TableKind, id: &str) -> Result<Arc<MappingTable>, PipelineError>;
}

/// In-memory resolver keyed by `(kind, id)`.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: FxHashMap<(TableKind, String), Arc<MappingTable>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` under `id` (its kind comes from the table).
    pub fn insert(&mut self, id: impl Into<String>, table: Arc<MappingTable>) {
        self.tables.insert((table.kind(), id.into()), table);
    }

    pub fn with_table(mut self, id: impl Into<String>, table: MappingTable) -> Self {
        self.insert(id, table.shared());
        self
    }

    pub fn get(&self, kind: TableKind, id: &str) -> Option<&Arc<MappingTable>> {
        self.tables.get(&(kind, id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableResolver for TableRegistry {
    fn resolve(&self, kind: TableKind, id: &str) -> Result<Arc<MappingTable>, PipelineError> {
        self.get(kind, id).cloned().ok_or_else(|| {
            PipelineSpecError::new(
                ErrorCode::MissingTable,
                format!("/tables/{id}"),
                format!("no {kind} table registered under `{id}`"),
            )
            .into()
        })
    }
}
