//! Result types for composite queries

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token::PaginationToken;
use crate::document::{DocId, Document};
use crate::partition::PartitionId;

/// Identifier of a document in a composite result.
///
/// Local ids are only unique within their partition. The composite id packs
/// the partition id into the high and the local id into the low 64 bits, so
/// it is unique across partitions and stable across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeId(Uuid);

impl CompositeId {
    pub fn new(partition: PartitionId, local_id: DocId) -> Self {
        Self(Uuid::from_u128((u128::from(partition) << 64) | u128::from(local_id)))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The globally merged answer to a composite query
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeResult {
    pub(crate) documents_by_id: HashMap<CompositeId, Document>,
    pub(crate) ordered_ids: Vec<CompositeId>,
    /// Source partition of every returned id
    pub(crate) provenance: HashMap<CompositeId, PartitionId>,
    pub(crate) has_more: bool,
    pub(crate) total_count: usize,
    pub(crate) next_offsets: BTreeMap<PartitionId, usize>,
    pub(crate) next_token: Option<PaginationToken>,
}

impl CompositeResult {
    /// Creates an empty result
    pub fn empty() -> Self {
        Self {
            documents_by_id: HashMap::new(),
            ordered_ids: Vec::new(),
            provenance: HashMap::new(),
            has_more: false,
            total_count: 0,
            next_offsets: BTreeMap::new(),
            next_token: None,
        }
    }

    /// Returns true if no documents were returned
    pub fn is_empty(&self) -> bool {
        self.ordered_ids.is_empty()
    }

    /// Returns the number of returned documents
    pub fn len(&self) -> usize {
        self.ordered_ids.len()
    }

    /// Returned ids in result order
    pub fn ordered_ids(&self) -> &[CompositeId] {
        &self.ordered_ids
    }

    pub fn get(&self, id: &CompositeId) -> Option<&Document> {
        self.documents_by_id.get(id)
    }

    /// Iterates `(id, document)` pairs in result order
    pub fn iter(&self) -> impl Iterator<Item = (CompositeId, &Document)> {
        self.ordered_ids
            .iter()
            .filter_map(move |id| self.documents_by_id.get(id).map(|doc| (*id, doc)))
    }

    pub fn first(&self) -> Option<&Document> {
        self.iter().next().map(|(_, doc)| doc)
    }

    /// Clones the documents in result order
    pub fn to_list(&self) -> Vec<Document> {
        self.iter().map(|(_, doc)| doc.clone()).collect()
    }

    /// Partition a returned document came from
    pub fn partition_of(&self, id: &CompositeId) -> Option<PartitionId> {
        self.provenance.get(id).copied()
    }

    /// True if more matches exist beyond this result
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Matches across all consulted partitions, regardless of the page limit
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Resume offsets for the following page
    pub fn next_offsets(&self) -> &BTreeMap<PartitionId, usize> {
        &self.next_offsets
    }

    /// Token for the following page; `None` for unpaginated results
    pub fn next_token(&self) -> Option<&PaginationToken> {
        self.next_token.as_ref()
    }
}

impl Default for CompositeResult {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_ids_do_not_collide() {
        assert_ne!(CompositeId::new(0, 1), CompositeId::new(1, 0));
        assert_ne!(CompositeId::new(0, 1), CompositeId::new(1, 1));
        assert_eq!(CompositeId::new(3, 7), CompositeId::new(3, 7));
    }

    #[test]
    fn test_composite_id_display() {
        let id = CompositeId::new(1, 2);
        assert_eq!(id.to_string(), "00000000-0000-0001-0000-000000000002");
    }

    #[test]
    fn test_empty_result() {
        let result = CompositeResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
        assert!(result.first().is_none());
        assert!(result.next_token().is_none());
    }
}
