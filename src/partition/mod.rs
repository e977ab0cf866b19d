//! Partition stores
//!
//! A partition store owns one shard of a logical document store and answers
//! point lookups and bounded, locally sorted scans over it. Capabilities are
//! split into traits so a facade can require exactly what it uses:
//!
//! - [`PartitionStore`]: lookups and scans
//! - [`IndexedPartitionStore`]: index administration
//! - [`WritablePartitionStore`]: writes

mod index;
mod memory;
mod store;

pub use index::{FieldIndex, IndexDescriptor, IndexKey, IndexOptions, IndexType};
pub use memory::{MemoryPartitionStore, DEFAULT_KEY_FIELD};
pub use store::{
    IndexedPartitionStore, LocalResult, PartitionId, PartitionStore, WritablePartitionStore,
};
