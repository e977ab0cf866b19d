//! Composite stores
//!
//! Stitches independent per-partition results into one paginated, sortable
//! answer.
//!
//! # Flow
//!
//! facade → locator → partition stores → local results → merge engine →
//! composite result + next pagination token
//!
//! # Invariants
//!
//! - `total_count` is the sum of every consulted partition's match count
//! - A page never holds more than `token.size()` documents
//! - Returned ids are unique across partitions
//! - `has_more` is true iff a partition has more, or the merge cut candidates
//! - No state is kept between calls; the token is the whole cursor

mod facade;
mod fanout;
mod index_facade;
mod merge;
mod result;
mod token;
mod typed;

pub use facade::{CompositeDocumentStore, DEFAULT_MAX_PAGE_SIZE};
pub use fanout::FanoutMode;
pub use index_facade::CompositeIndexedStore;
pub use merge::MergeEngine;
pub use result::{CompositeId, CompositeResult};
pub use token::PaginationToken;
pub use typed::{TypedCompositeStore, TypedPage};
