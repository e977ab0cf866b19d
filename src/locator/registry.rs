//! In-process partition registry

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use super::StoreLocator;
use crate::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event};
use crate::partition::{PartitionId, PartitionStore};

type StoreMap<S> = BTreeMap<String, BTreeMap<PartitionId, Arc<S>>>;

/// Registry of partition stores hosted by this process.
///
/// `S` is the capability handed out, e.g. `dyn PartitionStore` or
/// `dyn IndexedPartitionStore`.
pub struct PartitionRegistry<S: ?Sized> {
    stores: RwLock<StoreMap<S>>,
    rebalancing: RwLock<BTreeSet<String>>,
}

impl<S: ?Sized> Default for PartitionRegistry<S> {
    fn default() -> Self {
        Self {
            stores: RwLock::new(BTreeMap::new()),
            rebalancing: RwLock::new(BTreeSet::new()),
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::StoreUnavailable("partition registry is poisoned".to_string())
}

impl<S: ?Sized + PartitionStore> PartitionRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a partition, replacing any previous handle for the same
    /// store name and partition id.
    pub fn register(&self, store: Arc<S>) -> StoreResult<()> {
        let partition = store.partition_id()?;
        let name = store.store_name().to_string();
        self.stores
            .write()
            .map_err(|_| poisoned())?
            .entry(name)
            .or_default()
            .insert(partition, store);
        Ok(())
    }

    /// Removes a partition, e.g. after it migrated to another process
    pub fn unregister(&self, store_name: &str, partition: PartitionId) -> StoreResult<Option<Arc<S>>> {
        let mut stores = self.stores.write().map_err(|_| poisoned())?;
        let removed = stores
            .get_mut(store_name)
            .and_then(|partitions| partitions.remove(&partition));
        if stores.get(store_name).is_some_and(BTreeMap::is_empty) {
            stores.remove(store_name);
        }
        Ok(removed)
    }

    /// While rebalancing, the store resolves to nothing
    pub fn set_rebalancing(&self, store_name: &str, rebalancing: bool) -> StoreResult<()> {
        let mut set = self.rebalancing.write().map_err(|_| poisoned())?;
        if rebalancing {
            set.insert(store_name.to_string());
        } else {
            set.remove(store_name);
        }
        Ok(())
    }

    /// Partition ids registered for a store
    pub fn partitions(&self, store_name: &str) -> StoreResult<Vec<PartitionId>> {
        let stores = self.stores.read().map_err(|_| poisoned())?;
        Ok(stores
            .get(store_name)
            .map(|partitions| partitions.keys().copied().collect())
            .unwrap_or_default())
    }
}

impl<S: ?Sized + PartitionStore> StoreLocator for PartitionRegistry<S> {
    type Store = S;

    fn resolve(&self, store_name: &str) -> StoreResult<Vec<Arc<S>>> {
        let rebalancing = self
            .rebalancing
            .read()
            .map_err(|_| poisoned())?
            .contains(store_name);

        let resolved: Vec<Arc<S>> = if rebalancing {
            Vec::new()
        } else {
            let stores = self.stores.read().map_err(|_| poisoned())?;
            stores
                .get(store_name)
                .map(|partitions| partitions.values().cloned().collect())
                .unwrap_or_default()
        };

        if resolved.is_empty() {
            let reason = if rebalancing { "rebalancing" } else { "no partitions" };
            log_event_with_fields(
                Event::StoreUnresolved,
                &[("store", store_name), ("reason", reason)],
            );
            return Err(StoreError::store_moved(store_name));
        }
        Ok(resolved)
    }
}
