//! Natural Language Processing components
//!
//! This module provides tokenization and Porter stemming.

pub mod porter;
pub mod tokenizer;
