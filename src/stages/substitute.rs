use std::sync::Arc;

use crate::errors::PipelineError;
use crate::pipeline::artifacts::{Shape, StageValue};
use crate::pipeline::traits::{mismatch, Stage, STAGE_LEMMATIZER, STAGE_SPELLING_MAPPER};
use crate::table::{MappingTable, TableKind};

/// Token-by-token table substitution.
///
/// Backs both the spelling mapper (surface spelling → canonical spelling)
/// and the lemmatizer (inflected form → lemma): each token found as a key is
/// replaced by its value, every other token passes through untouched.
/// The stage's role follows the kind of table it holds.
///
/// ```
/// use rapid_textnorm::prelude::*;
///
/// let table = MappingTable::from_pairs(TableKind::Spelling, [("labor", "labour")])?;
/// let mapper = TableSubstitution::new(table.shared());
/// assert_eq!(mapper.name(), "spelling_mapper");
///
/// let out = mapper.apply(StageValue::from(vec!["labor".to_string(), "day".to_string()]))?;
/// assert_eq!(out.as_tokens().unwrap(), ["labour", "day"]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct TableSubstitution {
    table: Arc<MappingTable>,
}

impl TableSubstitution {
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self { table }
    }

    /// Spelling mapper over `table`; fails if `table` is not a spelling table.
    pub fn spelling_mapper(table: Arc<MappingTable>) -> Result<Self, PipelineError> {
        Self::expecting(TableKind::Spelling, table)
    }

    /// Lemmatizer over `table`; fails if `table` is not a lemma table.
    pub fn lemmatizer(table: Arc<MappingTable>) -> Result<Self, PipelineError> {
        Self::expecting(TableKind::Lemma, table)
    }

    fn expecting(kind: TableKind, table: Arc<MappingTable>) -> Result<Self, PipelineError> {
        if table.kind() != kind {
            return Err(PipelineError::Configuration(format!(
                "expected a {kind} table, got a {} table",
                table.kind()
            )));
        }
        Ok(Self::new(table))
    }

    pub fn table(&self) -> &Arc<MappingTable> {
        &self.table
    }
}

impl Stage for TableSubstitution {
    fn name(&self) -> &'static str {
        match self.table.kind() {
            TableKind::Spelling => STAGE_SPELLING_MAPPER,
            TableKind::Lemma => STAGE_LEMMATIZER,
        }
    }

    fn input_shape(&self) -> Shape {
        Shape::TokenSequence
    }

    fn output_shape(&self) -> Shape {
        Shape::TokenSequence
    }

    fn apply(&self, input: StageValue) -> Result<StageValue, PipelineError> {
        let tokens = match input {
            StageValue::TokenSequence(tokens) => tokens,
            other => return Err(mismatch(self, &other)),
        };

        let mapped = tokens
            .into_iter()
            .map(|token| match self.table.lookup(&token) {
                Some(canonical) => canonical.to_string(),
                None => token,
            })
            .collect();
        Ok(StageValue::TokenSequence(mapped))
    }
}
