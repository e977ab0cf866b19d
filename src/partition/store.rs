//! Partition store capabilities and local results
//!
//! A partition store owns one shard of a logical store. The composite layer
//! only ever reads through these traits; it never inspects a store's
//! internals.

use std::collections::HashMap;

use serde_json::Value;

use super::index::{IndexDescriptor, IndexOptions};
use crate::document::{DocId, Document, Filter, SortSpec};
use crate::errors::StoreResult;

/// Identifier of a partition (shard)
pub type PartitionId = u32;

/// One partition's bounded answer to a query
#[derive(Debug, Clone, PartialEq)]
pub struct LocalResult {
    /// Partition that produced the result
    pub partition: PartitionId,
    /// Matched ids, in local order
    pub ids: Vec<DocId>,
    /// Documents for every id in `ids`
    pub documents_by_id: HashMap<DocId, Document>,
    /// True if the partition has matches beyond this result
    pub has_more: bool,
    /// Number of documents in the partition matching the query
    pub total_count: usize,
}

impl LocalResult {
    /// Builds a result from `(id, document)` pairs in local order
    pub fn new(
        partition: PartitionId,
        entries: Vec<(DocId, Document)>,
        has_more: bool,
        total_count: usize,
    ) -> Self {
        let mut ids = Vec::with_capacity(entries.len());
        let mut documents_by_id = HashMap::with_capacity(entries.len());
        for (id, doc) in entries {
            ids.push(id);
            documents_by_id.insert(id, doc);
        }
        Self {
            partition,
            ids,
            documents_by_id,
            has_more,
            total_count,
        }
    }

    /// A result with no matches
    pub fn empty(partition: PartitionId) -> Self {
        Self::new(partition, Vec::new(), false, 0)
    }

    /// Number of returned documents
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates `(id, document)` pairs in local order
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.ids
            .iter()
            .filter_map(move |id| self.documents_by_id.get(id).map(|doc| (*id, doc)))
    }
}

/// Read access to one partition of a logical store.
///
/// Every call fails with `StoreUnavailable` once the partition has been
/// closed or migrated; callers must not retry against the same handle.
pub trait PartitionStore: Send + Sync {
    /// Logical store name this partition belongs to
    fn store_name(&self) -> &str;

    fn partition_id(&self) -> StoreResult<PartitionId>;

    /// Point lookup by key. A null key is an invalid argument.
    fn get(&self, key: &Value) -> StoreResult<Option<Document>>;

    /// Unbounded, unsorted match
    fn find(&self, filter: &Filter) -> StoreResult<LocalResult>;

    /// Bounded match starting at `offset`, sorted locally if `sort` is given,
    /// else in insertion order.
    fn find_page(
        &self,
        filter: Option<&Filter>,
        sort: Option<&SortSpec>,
        offset: usize,
        size: usize,
    ) -> StoreResult<LocalResult>;
}

/// Index administration on one partition
pub trait IndexedPartitionStore: PartitionStore {
    fn create_index(&self, field: &str, options: &IndexOptions) -> StoreResult<()>;

    /// Rebuilds an existing index, on a background thread if `async_build`
    fn rebuild_index(&self, field: &str, async_build: bool) -> StoreResult<()>;

    fn drop_index(&self, field: &str) -> StoreResult<()>;

    fn drop_all_indices(&self) -> StoreResult<()>;

    fn list_indices(&self) -> StoreResult<Vec<IndexDescriptor>>;

    fn has_index(&self, field: &str) -> StoreResult<bool>;

    /// True while a background build of the index is running
    fn is_indexing(&self, field: &str) -> StoreResult<bool>;
}

/// Write access to one partition
pub trait WritablePartitionStore: PartitionStore {
    /// Inserts or replaces the document stored under `key`
    fn put(&self, key: Value, document: Document) -> StoreResult<DocId>;

    /// Inserts only if `key` is absent; returns the existing document otherwise
    fn put_if_absent(&self, key: Value, document: Document) -> StoreResult<Option<Document>>;

    fn put_all(&self, entries: Vec<(Value, Document)>) -> StoreResult<()>;

    /// Removes and returns the document stored under `key`
    fn delete(&self, key: &Value) -> StoreResult<Option<Document>>;
}
