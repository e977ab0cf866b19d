//! Merge engine
//!
//! Combines per-partition local results into one globally ordered page.
//!
//! Every partition was asked for at most `size` candidates starting at its
//! own resume offset, already sorted locally. The union therefore contains
//! the global top `size`, and the merge only has to order it and cut it at
//! `size` from offset 0. Offsets were consumed by the partitions and are
//! never applied again here.
//!
//! The next offset of a partition is its current offset plus the number of
//! returned documents that came from it. A partition whose candidates were
//! all passed over is not advanced, so they resurface on the next page.

use std::collections::{BTreeMap, HashMap};

use super::result::{CompositeId, CompositeResult};
use super::token::PaginationToken;
use crate::document::Document;
use crate::errors::StoreResult;
use crate::observability::{log_event_with_fields, Event};
use crate::partition::{LocalResult, PartitionId};

/// Union of local results in discovery order
struct Discovered {
    /// `(id, partition, document)`, ascending partition then local order
    entries: Vec<(CompositeId, PartitionId, Document)>,
    any_has_more: bool,
    total_count: usize,
}

impl Discovered {
    fn collect(local_results: BTreeMap<PartitionId, LocalResult>) -> Self {
        let mut entries = Vec::new();
        let mut any_has_more = false;
        let mut total_count = 0;

        for (partition, mut local) in local_results {
            any_has_more |= local.has_more;
            total_count += local.total_count;
            for id in &local.ids {
                if let Some(doc) = local.documents_by_id.remove(id) {
                    entries.push((CompositeId::new(partition, *id), partition, doc));
                }
            }
        }

        Self {
            entries,
            any_has_more,
            total_count,
        }
    }
}

/// Stateless merge of local results
pub struct MergeEngine;

impl MergeEngine {
    /// Merges one page of local results under `token`.
    ///
    /// `local_results` must hold the answer of every consulted partition to
    /// `find_page(filter, token.sort(), token.offset_for(p), token.size())`.
    pub fn merge(
        local_results: BTreeMap<PartitionId, LocalResult>,
        token: &PaginationToken,
    ) -> StoreResult<CompositeResult> {
        let consulted: Vec<PartitionId> = local_results.keys().copied().collect();
        let discovered = Discovered::collect(local_results);

        let mut ordered: Vec<usize> = match token.sort() {
            Some(sort) => sort.order_ids(
                discovered
                    .entries
                    .iter()
                    .enumerate()
                    .map(|(pos, (_, _, doc))| (pos, doc)),
            )?,
            None => (0..discovered.entries.len()).collect(),
        };

        let truncated = ordered.len() > token.size();
        ordered.truncate(token.size());

        // Offsets of partitions missing from this call are carried forward
        let mut next_offsets = token.offsets().clone();
        for partition in &consulted {
            next_offsets.insert(*partition, token.offset_for(*partition));
        }

        let mut slots: Vec<Option<(CompositeId, PartitionId, Document)>> =
            discovered.entries.into_iter().map(Some).collect();
        let mut ordered_ids = Vec::with_capacity(ordered.len());
        let mut documents_by_id = HashMap::with_capacity(ordered.len());
        let mut provenance = HashMap::with_capacity(ordered.len());

        for pos in ordered {
            if let Some((id, partition, doc)) = slots[pos].take() {
                *next_offsets.entry(partition).or_insert(0) += 1;
                ordered_ids.push(id);
                documents_by_id.insert(id, doc);
                provenance.insert(id, partition);
            }
        }

        let has_more = discovered.any_has_more || truncated;
        let returned = ordered_ids.len().to_string();
        let total = discovered.total_count.to_string();
        log_event_with_fields(
            Event::PageMerged,
            &[
                ("returned", returned.as_str()),
                ("total_count", total.as_str()),
                ("has_more", if has_more { "true" } else { "false" }),
            ],
        );

        Ok(CompositeResult {
            documents_by_id,
            ordered_ids,
            provenance,
            has_more,
            total_count: discovered.total_count,
            next_token: Some(token.next(next_offsets.clone())),
            next_offsets,
        })
    }

    /// Unbounded, unsorted union of local results
    pub fn union(local_results: BTreeMap<PartitionId, LocalResult>) -> CompositeResult {
        let discovered = Discovered::collect(local_results);

        let mut result = CompositeResult {
            has_more: discovered.any_has_more,
            total_count: discovered.total_count,
            ..CompositeResult::empty()
        };
        for (id, partition, doc) in discovered.entries {
            *result.next_offsets.entry(partition).or_insert(0) += 1;
            result.ordered_ids.push(id);
            result.documents_by_id.insert(id, doc);
            result.provenance.insert(id, partition);
        }
        result
    }
}
