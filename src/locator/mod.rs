//! Store location
//!
//! A locator maps a logical store name to the partition stores that are
//! currently reachable. It never returns an empty set: when no partition can
//! be reached (for example while shards are being rebalanced) it fails with
//! `StoreUnavailable` and the caller must re-resolve later.

mod partitioner;
mod registry;

use std::sync::Arc;

pub use partitioner::Partitioner;
pub use registry::PartitionRegistry;

use crate::errors::StoreResult;
use crate::partition::PartitionStore;

/// Resolves a store name to its reachable partitions
pub trait StoreLocator: Send + Sync {
    /// Capability of the returned handles
    type Store: ?Sized + PartitionStore;

    /// Returns the reachable partitions in ascending partition id order
    fn resolve(&self, store_name: &str) -> StoreResult<Vec<Arc<Self::Store>>>;
}

impl<L: StoreLocator + ?Sized> StoreLocator for Arc<L> {
    type Store = L::Store;

    fn resolve(&self, store_name: &str) -> StoreResult<Vec<Arc<Self::Store>>> {
        (**self).resolve(store_name)
    }
}
