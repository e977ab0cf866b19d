//! Typed access to composite results
//!
//! Documents are deserialized with serde into the caller's record type.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::facade::CompositeDocumentStore;
use super::result::CompositeResult;
use super::token::PaginationToken;
use crate::document::{Document, Filter};
use crate::errors::StoreResult;
use crate::locator::StoreLocator;

/// One page of typed records
#[derive(Debug, Clone, PartialEq)]
pub struct TypedPage<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub total_count: usize,
    pub next_token: PaginationToken,
}

/// A composite store whose documents are records of type `T`
pub struct TypedCompositeStore<T, L> {
    inner: CompositeDocumentStore<L>,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned, L: StoreLocator> TypedCompositeStore<T, L> {
    pub fn new(inner: CompositeDocumentStore<L>) -> Self {
        Self {
            inner,
            _record: PhantomData,
        }
    }

    pub fn inner(&self) -> &CompositeDocumentStore<L> {
        &self.inner
    }

    pub fn get(&self, key: &Value) -> StoreResult<Option<T>> {
        self.inner.get(key)?.map(Self::decode).transpose()
    }

    pub fn find(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        Self::decode_all(self.inner.find(filter)?)
    }

    pub fn find_page(
        &self,
        filter: Option<&Filter>,
        token: &PaginationToken,
    ) -> StoreResult<TypedPage<T>> {
        let result = match filter {
            Some(filter) => self.inner.find_page_with_filter(filter, token)?,
            None => self.inner.find_page(token)?,
        };
        let next_token = result
            .next_token()
            .cloned()
            .unwrap_or_else(|| token.next(result.next_offsets().clone()));
        let has_more = result.has_more();
        let total_count = result.total_count();

        Ok(TypedPage {
            items: Self::decode_all(result)?,
            has_more,
            total_count,
            next_token,
        })
    }

    fn decode(document: Document) -> StoreResult<T> {
        Ok(serde_json::from_value(document.into_value())?)
    }

    fn decode_all(result: CompositeResult) -> StoreResult<Vec<T>> {
        result.to_list().into_iter().map(Self::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::PartitionRegistry;
    use crate::partition::{MemoryPartitionStore, PartitionStore, WritablePartitionStore};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Movie {
        title: String,
        year: i64,
    }

    fn typed() -> TypedCompositeStore<Movie, PartitionRegistry<dyn PartitionStore>> {
        let registry = PartitionRegistry::<dyn PartitionStore>::new();
        let left = MemoryPartitionStore::new("movies", 0);
        left.put(json!("m1"), Document::new().with("title", "Heat").with("year", 1995)).unwrap();
        let right = MemoryPartitionStore::new("movies", 1);
        right.put(json!("m2"), Document::new().with("title", "Ronin").with("year", 1998)).unwrap();
        right.put(json!("m3"), Document::new().with("title", "Bad").with("year", "n/a")).unwrap();
        registry.register(Arc::new(left)).unwrap();
        registry.register(Arc::new(right)).unwrap();
        TypedCompositeStore::new(CompositeDocumentStore::new("movies", registry))
    }

    #[test]
    fn test_typed_get() {
        let movie = typed().get(&json!("m2")).unwrap().unwrap();
        assert_eq!(movie, Movie { title: "Ronin".into(), year: 1998 });
    }

    #[test]
    fn test_typed_page() {
        let store = typed();
        let token = PaginationToken::first_page(1).unwrap();
        let filter = Filter::gt("year", 1990);
        let page = store.find_page(Some(&filter), &token).unwrap();

        assert_eq!(page.items, vec![Movie { title: "Heat".into(), year: 1995 }]);
        assert!(page.has_more);
        assert_eq!(page.total_count, 2);

        let next = store.find_page(Some(&filter), &page.next_token).unwrap();
        assert_eq!(next.items[0].title, "Ronin");
        assert!(!next.has_more);
    }

    #[test]
    fn test_decode_failure_is_serialization_error() {
        let err = typed().get(&json!("m3")).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_SERIALIZATION");
    }
}
