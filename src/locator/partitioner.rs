//! Key to partition routing

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{StoreError, StoreResult};
use crate::partition::PartitionId;

/// Routes keys to partitions by a stable hash.
///
/// The same key always lands on the same partition for a given partition
/// count, across processes and runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    partitions: u32,
}

impl Partitioner {
    pub fn new(partitions: u32) -> StoreResult<Self> {
        if partitions == 0 {
            return Err(StoreError::invalid_argument("partition count must be positive"));
        }
        Ok(Self { partitions })
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// Partition owning `key`
    pub fn partition_for(&self, key: &Value) -> StoreResult<PartitionId> {
        if key.is_null() {
            return Err(StoreError::invalid_argument("key cannot be null"));
        }

        let mut hasher = Sha256::new();
        hasher.update(key.to_string().as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Ok((u64::from_be_bytes(prefix) % u64::from(self.partitions)) as PartitionId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_routing_is_stable() {
        let partitioner = Partitioner::new(4).unwrap();
        let first = partitioner.partition_for(&json!("m1")).unwrap();
        for _ in 0..10 {
            assert_eq!(partitioner.partition_for(&json!("m1")).unwrap(), first);
        }
        assert!(first < 4);
    }

    #[test]
    fn test_routing_spreads_keys() {
        let partitioner = Partitioner::new(3).unwrap();
        let mut seen = [false; 3];
        for i in 0..100 {
            seen[partitioner.partition_for(&json!(i)).unwrap() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(Partitioner::new(0).is_err());
        let partitioner = Partitioner::new(2).unwrap();
        assert!(partitioner.partition_for(&Value::Null).is_err());
    }
}
