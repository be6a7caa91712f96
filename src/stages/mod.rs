//! Concrete pipeline stages.
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | [`PreProcessor`] | text | text |
//! | [`Tokenizer`] | text | token sequence |
//! | [`ToLowerCase`] | text *or* token sequence (configured) | same |
//! | [`TableSubstitution`] (spelling mapper / lemmatizer) | token sequence | token sequence |
//! | [`PorterStemmer`] | token sequence | token sequence |
//! | [`PostProcessor`] | token sequence | structured record |

mod adapters;
mod case;
mod stem;
mod substitute;
mod tokenize;

pub use adapters::{PostProcessor, PreProcessor};
pub use case::ToLowerCase;
pub use stem::PorterStemmer;
pub use substitute::TableSubstitution;
pub use tokenize::Tokenizer;
