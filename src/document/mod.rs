//! Documents, filters and sort specifications
//!
//! Everything in this module is evaluated identically by every partition,
//! so that the merge layer can combine locally ordered results.

mod document;
mod filter;
mod sort;
mod text;

pub use document::{DocId, Document, FIELD_SEPARATOR};
pub use filter::{Filter, FilterEvaluator, ELEMENT_FIELD};
pub use sort::{
    builtin_collator, compare_numbers, compare_scalars, CaseInsensitiveCollator, Collator,
    NullOrder, NumericCollator, SortOrder, SortSpec,
};
pub use text::{TextTerm, TextTokenizer, DEFAULT_WHITESPACE_CHARS};

