//! Partition fan-out
//!
//! Runs one call against every resolved partition, sequentially or on the
//! rayon thread pool, and collects the answers by partition id. The first
//! error aborts the fan-out; no partial result is returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::partition::{PartitionId, PartitionStore};

/// How partitions are queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutMode {
    /// One partition after another on the calling thread
    #[default]
    Sequential,
    /// All partitions at once on the rayon pool
    Parallel,
}

/// A partition that went away surfaces as "store moved, re-resolve"
pub(crate) fn remap_unavailable(store_name: &str, partition: Option<PartitionId>, err: StoreError) -> StoreError {
    if !err.is_unavailable() {
        return err;
    }
    let partition = partition.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string());
    let reason = err.to_string();
    log_event_with_fields(
        Event::PartitionUnavailable,
        &[("store", store_name), ("partition", &partition), ("reason", &reason)],
    );
    StoreError::store_moved(store_name)
}

/// Calls `op` on every store and collects the answers by partition id
pub(crate) fn fan_out<S, T, F>(
    store_name: &str,
    operation: &str,
    stores: &[Arc<S>],
    mode: FanoutMode,
    op: F,
) -> StoreResult<BTreeMap<PartitionId, T>>
where
    S: ?Sized + PartitionStore,
    T: Send,
    F: Fn(PartitionId, &S) -> StoreResult<T> + Send + Sync,
{
    let partitions = stores.len().to_string();
    let scope = ObservationScope::with_fields(
        "FANOUT",
        &[("store", store_name), ("operation", operation), ("partitions", &partitions)],
    );

    let call = |store: &Arc<S>| -> StoreResult<(PartitionId, T)> {
        let partition = store
            .partition_id()
            .map_err(|e| remap_unavailable(store_name, None, e))?;
        let value = op(partition, &**store).map_err(|e| remap_unavailable(store_name, Some(partition), e))?;
        Ok((partition, value))
    };

    let collected: StoreResult<Vec<(PartitionId, T)>> = match mode {
        FanoutMode::Sequential => stores.iter().map(call).collect(),
        FanoutMode::Parallel => stores.par_iter().map(call).collect(),
    };

    match collected {
        Ok(answers) => {
            scope.complete();
            Ok(answers.into_iter().collect())
        }
        Err(e) => {
            scope.fail(&e.to_string());
            Err(e)
        }
    }
}
