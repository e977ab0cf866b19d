//! Index administration across partitions
//!
//! Index state is per partition, so answers are returned per partition id
//! and never folded into one value.

use std::collections::BTreeMap;

use super::fanout::{fan_out, FanoutMode};
use crate::errors::{StoreError, StoreResult};
use crate::locator::StoreLocator;
use crate::partition::{IndexDescriptor, IndexOptions, IndexedPartitionStore, PartitionId};

/// Broadcasts index administration to every partition of one store
pub struct CompositeIndexedStore<L> {
    store_name: String,
    locator: L,
    fanout: FanoutMode,
}

impl<L> CompositeIndexedStore<L>
where
    L: StoreLocator,
    L::Store: IndexedPartitionStore,
{
    pub fn new(store_name: impl Into<String>, locator: L) -> Self {
        Self {
            store_name: store_name.into(),
            locator,
            fanout: FanoutMode::default(),
        }
    }

    pub fn with_fanout(mut self, fanout: FanoutMode) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn create_index(&self, field: &str, options: &IndexOptions) -> StoreResult<()> {
        Self::check_field(field)?;
        self.broadcast("create_index", |_, store| store.create_index(field, options))?;
        Ok(())
    }

    pub fn rebuild_index(&self, field: &str, async_build: bool) -> StoreResult<()> {
        Self::check_field(field)?;
        self.broadcast("rebuild_index", |_, store| store.rebuild_index(field, async_build))?;
        Ok(())
    }

    pub fn drop_index(&self, field: &str) -> StoreResult<()> {
        Self::check_field(field)?;
        self.broadcast("drop_index", |_, store| store.drop_index(field))?;
        Ok(())
    }

    pub fn drop_all_indices(&self) -> StoreResult<()> {
        self.broadcast("drop_all_indices", |_, store| store.drop_all_indices())?;
        Ok(())
    }

    pub fn list_indices(&self) -> StoreResult<BTreeMap<PartitionId, Vec<IndexDescriptor>>> {
        self.broadcast("list_indices", |_, store| store.list_indices())
    }

    pub fn has_index(&self, field: &str) -> StoreResult<BTreeMap<PartitionId, bool>> {
        Self::check_field(field)?;
        self.broadcast("has_index", |_, store| store.has_index(field))
    }

    pub fn is_indexing(&self, field: &str) -> StoreResult<BTreeMap<PartitionId, bool>> {
        Self::check_field(field)?;
        self.broadcast("is_indexing", |_, store| store.is_indexing(field))
    }

    fn check_field(field: &str) -> StoreResult<()> {
        if field.is_empty() {
            return Err(StoreError::invalid_argument("index field cannot be empty"));
        }
        Ok(())
    }

    fn broadcast<T, F>(&self, operation: &str, op: F) -> StoreResult<BTreeMap<PartitionId, T>>
    where
        T: Send,
        F: Fn(PartitionId, &L::Store) -> StoreResult<T> + Send + Sync,
    {
        let stores = self.locator.resolve(&self.store_name)?;
        fan_out(&self.store_name, operation, &stores, self.fanout, op)
    }
}
