//! CSV loading for spelling and lemma tables.
//!
//! # Spelling tables
//!
//! ```text
//! target,alternative
//! colour,color
//! aluminium,aluminum
//! ```
//!
//! Every non-empty column after the first is an alternative spelling; each
//! becomes a key that maps to the target in column one.
//!
//! # Lemma tables
//!
//! ```text
//! lemma,derivatives
//! be,"is, was, are, were, been, being"
//! run,"runs, ran, running"
//! ```
//!
//! Columns after the first hold comma-separated derivative lists; each
//! derivative becomes a key mapping to the lemma. A derivative that is
//! itself the lemma of another row is left out: the word is already in
//! canonical form and must not be rewritten.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::{DuplicatePolicy, MappingTable, MappingTableBuilder, TableKind, TableResolver};
use crate::errors::{MalformedTableError, PipelineError};

/// Reads mapping tables from CSV files or readers.
#[derive(Debug, Clone)]
pub struct CsvTableLoader {
    base_dir: Option<PathBuf>,
    has_headers: bool,
    duplicates: DuplicatePolicy,
}

impl Default for CsvTableLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvTableLoader {
    /// Loader expecting a header row and rejecting conflicting keys.
    pub fn new() -> Self {
        Self {
            base_dir: None,
            has_headers: true,
            duplicates: DuplicatePolicy::Reject,
        }
    }

    /// Resolve relative table paths against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Load a table of `kind` from `path`.
    pub fn load(&self, kind: TableKind, path: impl AsRef<Path>) -> Result<MappingTable, PipelineError> {
        let path = self.resolve_path(path.as_ref());
        let file = File::open(&path).map_err(|source| PipelineError::TableIo {
            path: path.clone(),
            source,
        })?;
        let table = self.read(kind, file)?;
        tracing::debug!(
            kind = kind.as_str(),
            path = %path.display(),
            entries = table.len(),
            "loaded mapping table"
        );
        Ok(table)
    }

    /// Parse a table of `kind` from any reader.
    pub fn read<R: io::Read>(&self, kind: TableKind, reader: R) -> Result<MappingTable, PipelineError> {
        let table = match kind {
            TableKind::Spelling => self.read_spelling(reader)?,
            TableKind::Lemma => self.read_lemma(reader)?,
        };
        Ok(table)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn csv_reader<R: io::Read>(&self, reader: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader)
    }

    fn builder(&self, kind: TableKind) -> MappingTableBuilder {
        MappingTable::builder(kind).with_duplicate_policy(self.duplicates)
    }

    /// 1-based source line of the `index`-th record.
    fn row_number(&self, index: usize) -> usize {
        index + 1 + usize::from(self.has_headers)
    }

    fn read_spelling<R: io::Read>(&self, reader: R) -> Result<MappingTable, MalformedTableError> {
        let kind = TableKind::Spelling;
        let mut builder = self.builder(kind);

        for (index, record) in self.csv_reader(reader).records().enumerate() {
            let record = record.map_err(|source| MalformedTableError::Csv { table: kind, source })?;
            let row = self.row_number(index);

            let target = required(&record, 0, kind, row, "target")?;
            let mut alternatives = record.iter().skip(1).filter(|f| !f.is_empty()).peekable();
            if alternatives.peek().is_none() {
                return Err(missing(kind, row, "alternative"));
            }
            for alternative in alternatives {
                builder.insert_row(row, alternative.to_string(), target.to_string())?;
            }
        }

        Ok(builder.build())
    }

    fn read_lemma<R: io::Read>(&self, reader: R) -> Result<MappingTable, MalformedTableError> {
        let kind = TableKind::Lemma;
        let mut rows: Vec<(usize, String, Vec<String>)> = Vec::new();

        for (index, record) in self.csv_reader(reader).records().enumerate() {
            let record = record.map_err(|source| MalformedTableError::Csv { table: kind, source })?;
            let row = self.row_number(index);

            let lemma = required(&record, 0, kind, row, "lemma")?.to_string();
            let derivatives: Vec<String> = record
                .iter()
                .skip(1)
                .flat_map(split_derivatives)
                .collect();
            if derivatives.is_empty() {
                return Err(missing(kind, row, "derivatives"));
            }
            rows.push((row, lemma, derivatives));
        }

        let lemmas: FxHashSet<&str> = rows.iter().map(|(_, lemma, _)| lemma.as_str()).collect();
        let mut builder = self.builder(kind);
        for (row, lemma, derivatives) in &rows {
            for derivative in derivatives {
                if derivative != lemma && lemmas.contains(derivative.as_str()) {
                    continue;
                }
                builder.insert_row(*row, derivative.clone(), lemma.clone())?;
            }
        }

        Ok(builder.build())
    }
}

impl TableResolver for CsvTableLoader {
    fn resolve(&self, kind: TableKind, id: &str) -> Result<Arc<MappingTable>, PipelineError> {
        self.load(kind, id).map(Arc::new)
    }
}

fn split_derivatives(field: &str) -> impl Iterator<Item = String> + '_ {
    field
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    kind: TableKind,
    row: usize,
    field: &'static str,
) -> Result<&'r str, MalformedTableError> {
    match record.get(index) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(missing(kind, row, field)),
    }
}

fn missing(table: TableKind, row: usize, field: &'static str) -> MalformedTableError {
    MalformedTableError::MissingField { table, row, field }
}
