//! Pagination tokens
//!
//! The token is the only state a caller carries between pages. It records
//! where every partition should resume, plus the page size and sort. A
//! partition missing from the map resumes at offset 0.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::document::SortSpec;
use crate::errors::{StoreError, StoreResult};
use crate::partition::PartitionId;

/// Cross-partition cursor for `find_page`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationToken {
    #[serde(default, deserialize_with = "deserialize_offsets")]
    offsets_by_partition: BTreeMap<PartitionId, usize>,
    size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort: Option<SortSpec>,
}

impl PaginationToken {
    /// Token for the first page of `size` documents
    pub fn first_page(size: usize) -> StoreResult<Self> {
        let token = Self {
            offsets_by_partition: BTreeMap::new(),
            size,
            sort: None,
        };
        token.validate(usize::MAX)?;
        Ok(token)
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_offsets(mut self, offsets: BTreeMap<PartitionId, usize>) -> Self {
        self.offsets_by_partition = offsets;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn offsets(&self) -> &BTreeMap<PartitionId, usize> {
        &self.offsets_by_partition
    }

    /// Resume offset for a partition
    pub fn offset_for(&self, partition: PartitionId) -> usize {
        self.offsets_by_partition.get(&partition).copied().unwrap_or(0)
    }

    pub fn is_first_page(&self) -> bool {
        self.offsets_by_partition.values().all(|offset| *offset == 0)
    }

    /// Checks the page shape before any partition is contacted
    pub fn validate(&self, max_size: usize) -> StoreResult<()> {
        if self.size == 0 {
            return Err(StoreError::invalid_argument("page size must be positive"));
        }
        if self.size > max_size {
            return Err(StoreError::invalid_argument(format!(
                "page size {} exceeds the maximum of {}",
                self.size, max_size
            )));
        }
        if let Some(sort) = &self.sort {
            if sort.field.is_empty() {
                return Err(StoreError::invalid_argument("sort field cannot be empty"));
            }
        }
        Ok(())
    }

    /// Token for the following page, same size and sort
    pub fn next(&self, offsets: BTreeMap<PartitionId, usize>) -> Self {
        Self {
            offsets_by_partition: offsets,
            size: self.size,
            sort: self.sort.clone(),
        }
    }
}

/// Partition ids as map keys. JSON object keys are strings, and callers
/// that buffer the token (tagged request enums) hand them over as such.
struct PartitionKey(PartitionId);

impl<'de> Deserialize<'de> for PartitionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = PartitionKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a partition id as an integer or a numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PartitionKey, E> {
                PartitionId::try_from(v)
                    .map(PartitionKey)
                    .map_err(|_| E::custom(format!("partition id {} out of range", v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PartitionKey, E> {
                u64::try_from(v)
                    .map_err(|_| E::custom(format!("partition id {} out of range", v)))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PartitionKey, E> {
                v.parse::<PartitionId>()
                    .map(PartitionKey)
                    .map_err(|_| E::custom(format!("invalid partition id '{}'", v)))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

fn deserialize_offsets<'de, D>(deserializer: D) -> Result<BTreeMap<PartitionId, usize>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OffsetsVisitor;

    impl<'de> Visitor<'de> for OffsetsVisitor {
        type Value = BTreeMap<PartitionId, usize>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of partition id to offset")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut offsets = BTreeMap::new();
            while let Some((PartitionKey(partition), offset)) = map.next_entry::<PartitionKey, usize>()? {
                offsets.insert(partition, offset);
            }
            Ok(offsets)
        }
    }

    deserializer.deserialize_map(OffsetsVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_partition_resumes_at_zero() {
        let token = PaginationToken::first_page(10)
            .unwrap()
            .with_offsets(BTreeMap::from([(1, 4)]));
        assert_eq!(token.offset_for(1), 4);
        assert_eq!(token.offset_for(7), 0);
        assert!(!token.is_first_page());
    }

    #[test]
    fn test_size_validation() {
        assert!(PaginationToken::first_page(0).is_err());

        let token = PaginationToken::first_page(50).unwrap();
        assert!(token.validate(100).is_ok());
        assert_eq!(token.validate(20).unwrap_err().code(), "DOCSHARD_INVALID_ARGUMENT");
    }

    #[test]
    fn test_next_keeps_shape() {
        let token = PaginationToken::first_page(2)
            .unwrap()
            .with_sort(SortSpec::desc("rating"));
        let next = token.next(BTreeMap::from([(0, 2)]));
        assert_eq!(next.size(), 2);
        assert_eq!(next.sort(), Some(&SortSpec::desc("rating")));
        assert_eq!(next.offset_for(0), 2);
    }

    #[test]
    fn test_token_json_shape() {
        let token: PaginationToken = serde_json::from_value(json!({
            "size": 5,
            "offsets_by_partition": {"0": 3, "2": 1},
            "sort": {"field": "year", "order": "descending"}
        }))
        .unwrap();

        assert_eq!(token.size(), 5);
        assert_eq!(token.offset_for(2), 1);
        assert_eq!(token.sort(), Some(&SortSpec::desc("year")));
    }

    #[test]
    fn test_token_read_back_through_tagged_enum() {
        #[derive(Deserialize)]
        #[serde(tag = "op", rename_all = "snake_case")]
        enum Envelope {
            Resume { token: PaginationToken },
        }

        let token = PaginationToken::first_page(2)
            .unwrap()
            .next(BTreeMap::from([(0, 1), (3, 4)]));
        let body = json!({"op": "resume", "token": serde_json::to_value(&token).unwrap()});
        let Envelope::Resume { token: parsed } = serde_json::from_value(body).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_bad_partition_key_rejected() {
        let parsed = serde_json::from_value::<PaginationToken>(json!({
            "size": 5,
            "offsets_by_partition": {"first": 3}
        }));
        assert!(parsed.is_err());
    }
}
