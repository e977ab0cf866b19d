//! Composite document store
//!
//! Presents every partition of a logical store as one store. Lookups probe
//! the partitions one by one; scans fan out to all of them and merge.

use serde_json::Value;

use super::fanout::{fan_out, remap_unavailable, FanoutMode};
use super::merge::MergeEngine;
use super::result::CompositeResult;
use super::token::PaginationToken;
use crate::document::{Document, Filter};
use crate::errors::{StoreError, StoreResult};
use crate::locator::StoreLocator;
use crate::partition::PartitionStore;

/// Default upper bound on a page
pub const DEFAULT_MAX_PAGE_SIZE: usize = 10_000;

/// Read facade over all partitions of one store
pub struct CompositeDocumentStore<L> {
    store_name: String,
    locator: L,
    fanout: FanoutMode,
    max_page_size: usize,
}

impl<L: StoreLocator> CompositeDocumentStore<L> {
    pub fn new(store_name: impl Into<String>, locator: L) -> Self {
        Self {
            store_name: store_name.into(),
            locator,
            fanout: FanoutMode::default(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_fanout(mut self, fanout: FanoutMode) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Returns the document stored under `key` in any partition.
    ///
    /// Without routing metadata every partition may have to be probed; the
    /// first hit wins.
    pub fn get(&self, key: &Value) -> StoreResult<Option<Document>> {
        if key.is_null() {
            return Err(StoreError::invalid_argument("key cannot be null"));
        }

        for store in self.locator.resolve(&self.store_name)? {
            let found = store
                .get(key)
                .map_err(|e| remap_unavailable(&self.store_name, store.partition_id().ok(), e))?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// All matching documents of all partitions, unsorted
    pub fn find(&self, filter: &Filter) -> StoreResult<CompositeResult> {
        filter.validate()?;

        let stores = self.locator.resolve(&self.store_name)?;
        let local_results = fan_out(&self.store_name, "find", &stores, self.fanout, |_, store| {
            store.find(filter)
        })?;
        Ok(MergeEngine::union(local_results))
    }

    /// One page of all documents, shaped by `token`
    pub fn find_page(&self, token: &PaginationToken) -> StoreResult<CompositeResult> {
        self.page(None, token)
    }

    /// One page of matching documents, shaped by `token`
    pub fn find_page_with_filter(
        &self,
        filter: &Filter,
        token: &PaginationToken,
    ) -> StoreResult<CompositeResult> {
        filter.validate()?;
        self.page(Some(filter), token)
    }

    fn page(&self, filter: Option<&Filter>, token: &PaginationToken) -> StoreResult<CompositeResult> {
        token.validate(self.max_page_size)?;

        let stores = self.locator.resolve(&self.store_name)?;
        let local_results = fan_out(
            &self.store_name,
            "find_page",
            &stores,
            self.fanout,
            |partition, store| {
                store.find_page(filter, token.sort(), token.offset_for(partition), token.size())
            },
        )?;
        MergeEngine::merge(local_results, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::PartitionRegistry;
    use crate::partition::{MemoryPartitionStore, WritablePartitionStore};
    use serde_json::json;
    use std::sync::Arc;

    fn facade() -> CompositeDocumentStore<PartitionRegistry<dyn PartitionStore>> {
        let registry = PartitionRegistry::<dyn PartitionStore>::new();
        for partition in 0..2 {
            let store = MemoryPartitionStore::new("movies", partition);
            store
                .put(json!(format!("k{}", partition)), Document::new().with("n", partition))
                .unwrap();
            registry.register(Arc::new(store)).unwrap();
        }
        CompositeDocumentStore::new("movies", registry)
    }

    #[test]
    fn test_get_probes_all_partitions() {
        let facade = facade();
        let doc = facade.get(&json!("k1")).unwrap().unwrap();
        assert_eq!(doc.get("n"), Some(&json!(1)));
        assert!(facade.get(&json!("k9")).unwrap().is_none());
    }

    #[test]
    fn test_null_key_rejected_before_resolve() {
        let facade = CompositeDocumentStore::new("nowhere", PartitionRegistry::<dyn PartitionStore>::new());
        let err = facade.get(&Value::Null).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_INVALID_ARGUMENT");
    }

    #[test]
    fn test_page_size_bounded() {
        let facade = facade().with_max_page_size(10);
        let token = PaginationToken::first_page(11).unwrap();
        assert!(facade.find_page(&token).is_err());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let facade = facade();
        let err = facade.find(&Filter::and(vec![])).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_INVALID_ARGUMENT");
    }
}
