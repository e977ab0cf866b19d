//! In-memory partition store
//!
//! Holds one partition's documents in insertion order together with its
//! field indexes. Local ids come from a monotonically increasing counter, so
//! ascending id order is insertion order; an upsert keeps the original id.
//!
//! Queries take the read lock, writes and index builds the write lock. A
//! background index build holds the write lock for the whole build, so no
//! write can slip past it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use serde_json::Value;

use super::index::{FieldIndex, IndexDescriptor, IndexOptions, IndexType};
use super::store::{
    IndexedPartitionStore, LocalResult, PartitionId, PartitionStore, WritablePartitionStore,
};
use crate::document::{DocId, Document, Filter, FilterEvaluator, SortSpec, TextTokenizer};
use crate::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event};

/// Default document key field
pub const DEFAULT_KEY_FIELD: &str = "_key";

#[derive(Debug, Default)]
struct PartitionState {
    next_id: DocId,
    documents: BTreeMap<DocId, Document>,
    /// Canonical key text to local id
    keys: HashMap<String, DocId>,
    indexes: BTreeMap<String, FieldIndex>,
    /// Fields with a background build in flight
    building: BTreeMap<String, PendingBuild>,
    build_generation: u64,
}

/// A background build; only the build holding the current generation for
/// its field may install or clear it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingBuild {
    index_type: IndexType,
    generation: u64,
}

impl PartitionState {
    fn index_type(&self, field: &str) -> Option<IndexType> {
        self.building
            .get(field)
            .map(|pending| pending.index_type)
            .or_else(|| self.indexes.get(field).map(FieldIndex::index_type))
    }

    fn begin_build(&mut self, field: &str, index_type: IndexType) -> PendingBuild {
        self.build_generation += 1;
        let pending = PendingBuild {
            index_type,
            generation: self.build_generation,
        };
        self.building.insert(field.to_string(), pending);
        pending
    }

    /// Candidate ids from indexes, ascending; `None` means full scan
    fn candidates(&self, filter: &Filter, tokenizer: &TextTokenizer) -> Option<BTreeSet<DocId>> {
        match filter {
            Filter::Eq { field, value } => self
                .indexes
                .get(field)?
                .lookup_eq(value)
                .map(|ids| ids.into_iter().collect()),
            Filter::In { field, values } => {
                let index = self.indexes.get(field)?;
                let mut ids = BTreeSet::new();
                for value in values {
                    ids.extend(index.lookup_eq(value)?);
                }
                Some(ids)
            }
            Filter::Text { field, query } => {
                let index = self.indexes.get(field)?;
                if index.index_type() != IndexType::Fulltext {
                    return None;
                }
                let terms = tokenizer.query_terms(query);
                Some(index.lookup_text(&terms).into_iter().collect())
            }
            Filter::And { filters } => filters
                .iter()
                .filter_map(|f| self.candidates(f, tokenizer))
                .reduce(|acc, ids| acc.intersection(&ids).copied().collect()),
            Filter::Or { filters } => {
                let mut ids = BTreeSet::new();
                for f in filters {
                    ids.extend(self.candidates(f, tokenizer)?);
                }
                Some(ids)
            }
            _ => None,
        }
    }

    fn check_indexes(&self, id: DocId, doc: &Document) -> StoreResult<()> {
        self.indexes
            .values()
            .try_for_each(|index| index.check_insert(id, doc))
    }
}

/// A partition store kept entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryPartitionStore {
    store_name: String,
    partition: PartitionId,
    key_field: String,
    tokenizer: Arc<TextTokenizer>,
    open: Arc<AtomicBool>,
    state: Arc<RwLock<PartitionState>>,
}

impl MemoryPartitionStore {
    /// Creates an empty, open partition store
    pub fn new(store_name: impl Into<String>, partition: PartitionId) -> Self {
        Self {
            store_name: store_name.into(),
            partition,
            key_field: DEFAULT_KEY_FIELD.to_string(),
            tokenizer: Arc::new(TextTokenizer::default()),
            open: Arc::new(AtomicBool::new(true)),
            state: Arc::new(RwLock::new(PartitionState::default())),
        }
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TextTokenizer) -> Self {
        self.tokenizer = Arc::new(tokenizer);
        self
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Number of stored documents
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_state()?.documents.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Closes the store; every later call fails with `StoreUnavailable`.
    ///
    /// Clones share the open flag, so closing one handle closes them all.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let partition = self.partition.to_string();
            log_event_with_fields(
                Event::StoreClosed,
                &[("store", &self.store_name), ("partition", &partition)],
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::store_closed(&self.store_name))
        }
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, PartitionState>> {
        self.ensure_open()?;
        self.state
            .read()
            .map_err(|_| StoreError::StoreUnavailable(format!("Store {} is poisoned", self.store_name)))
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, PartitionState>> {
        self.ensure_open()?;
        self.state
            .write()
            .map_err(|_| StoreError::StoreUnavailable(format!("Store {} is poisoned", self.store_name)))
    }

    fn canonical_key(key: &Value) -> StoreResult<String> {
        if key.is_null() {
            return Err(StoreError::invalid_argument("key cannot be null"));
        }
        Ok(key.to_string())
    }

    /// Ids of matching documents in insertion order
    fn matching_ids(&self, state: &PartitionState, filter: Option<&Filter>) -> StoreResult<Vec<DocId>> {
        let filter = match filter {
            None | Some(Filter::All) => return Ok(state.documents.keys().copied().collect()),
            Some(filter) => filter,
        };

        for field in filter.text_fields() {
            if state.index_type(field) != Some(IndexType::Fulltext) {
                return Err(StoreError::field_not_indexed(field));
            }
        }

        let evaluator = FilterEvaluator::new(filter, &self.tokenizer)?;
        let ids = match state.candidates(filter, &self.tokenizer) {
            Some(candidates) => candidates
                .into_iter()
                .filter(|id| state.documents.get(id).is_some_and(|doc| evaluator.matches(doc)))
                .collect(),
            None => state
                .documents
                .iter()
                .filter(|(_, doc)| evaluator.matches(doc))
                .map(|(id, _)| *id)
                .collect(),
        };
        Ok(ids)
    }

    fn entries(state: &PartitionState, ids: &[DocId]) -> Vec<(DocId, Document)> {
        ids.iter()
            .filter_map(|id| state.documents.get(id).map(|doc| (*id, doc.clone())))
            .collect()
    }

    fn put_locked(
        &self,
        state: &mut PartitionState,
        key: Value,
        mut document: Document,
    ) -> StoreResult<DocId> {
        let canonical = Self::canonical_key(&key)?;
        document.put(self.key_field.clone(), key);

        let existing = state.keys.get(&canonical).copied();
        let id = existing.unwrap_or(state.next_id);
        state.check_indexes(id, &document)?;

        if let Some(old) = existing.and_then(|id| state.documents.remove(&id)) {
            for index in state.indexes.values_mut() {
                index.remove(id, &old, &self.tokenizer);
            }
        }
        for index in state.indexes.values_mut() {
            index.insert(id, &document, &self.tokenizer);
        }

        state.documents.insert(id, document);
        if existing.is_none() {
            state.keys.insert(canonical, id);
            state.next_id += 1;
        }
        Ok(id)
    }

    fn spawn_build(&self, field: String, pending: PendingBuild) {
        let state = Arc::clone(&self.state);
        let tokenizer = Arc::clone(&self.tokenizer);
        let store_name = self.store_name.clone();
        let partition = self.partition.to_string();

        log_event_with_fields(
            Event::IndexBuildBegin,
            &[("store", &store_name), ("partition", &partition), ("field", &field)],
        );

        thread::spawn(move || {
            let fields = [("store", store_name.as_str()), ("partition", partition.as_str()), ("field", field.as_str())];
            run_build(&state, &tokenizer, &field, pending, &fields);
        });
    }

    fn log_index_event(&self, event: Event, field: &str) {
        let partition = self.partition.to_string();
        log_event_with_fields(
            event,
            &[("store", &self.store_name), ("partition", &partition), ("field", field)],
        );
    }
}

/// Body of a background build. A build whose generation was superseded by a
/// drop or a newer build leaves the partition untouched.
fn run_build(
    state: &RwLock<PartitionState>,
    tokenizer: &TextTokenizer,
    field: &str,
    pending: PendingBuild,
    fields: &[(&str, &str)],
) {
    let (mut guard, poisoned) = match state.write() {
        Ok(guard) => (guard, false),
        Err(e) => (e.into_inner(), true),
    };
    if guard.building.get(field) != Some(&pending) {
        return;
    }
    guard.building.remove(field);

    let built = if poisoned {
        Err(StoreError::StoreUnavailable("partition state is poisoned".to_string()))
    } else {
        FieldIndex::build(
            field,
            pending.index_type,
            guard.documents.iter().map(|(id, doc)| (*id, doc)),
            tokenizer,
        )
    };
    match built {
        Ok(index) => {
            guard.indexes.insert(field.to_string(), index);
            log_event_with_fields(Event::IndexRebuilt, fields);
        }
        Err(e) => {
            let reason = e.to_string();
            let mut fields = fields.to_vec();
            fields.push(("reason", reason.as_str()));
            log_event_with_fields(Event::IndexBuildFailed, &fields);
        }
    }
}

impl PartitionStore for MemoryPartitionStore {
    fn store_name(&self) -> &str {
        &self.store_name
    }

    fn partition_id(&self) -> StoreResult<PartitionId> {
        self.ensure_open()?;
        Ok(self.partition)
    }

    fn get(&self, key: &Value) -> StoreResult<Option<Document>> {
        let canonical = Self::canonical_key(key)?;
        let state = self.read_state()?;
        Ok(state
            .keys
            .get(&canonical)
            .and_then(|id| state.documents.get(id))
            .cloned())
    }

    fn find(&self, filter: &Filter) -> StoreResult<LocalResult> {
        let state = self.read_state()?;
        let ids = self.matching_ids(&state, Some(filter))?;
        let total = ids.len();
        Ok(LocalResult::new(self.partition, Self::entries(&state, &ids), false, total))
    }

    fn find_page(
        &self,
        filter: Option<&Filter>,
        sort: Option<&SortSpec>,
        offset: usize,
        size: usize,
    ) -> StoreResult<LocalResult> {
        if size == 0 {
            return Err(StoreError::invalid_argument("page size must be positive"));
        }

        let state = self.read_state()?;
        let mut ids = self.matching_ids(&state, filter)?;
        if let Some(sort) = sort {
            ids = sort.order_ids(
                ids.iter()
                    .filter_map(|id| state.documents.get(id).map(|doc| (*id, doc))),
            )?;
        }

        let total = ids.len();
        if offset > total {
            return Err(StoreError::invalid_argument(format!(
                "offset {} is past the {} matching documents of partition {}",
                offset, total, self.partition
            )));
        }
        let end = offset.saturating_add(size).min(total);

        Ok(LocalResult::new(
            self.partition,
            Self::entries(&state, &ids[offset..end]),
            end < total,
            total,
        ))
    }
}

impl WritablePartitionStore for MemoryPartitionStore {
    fn put(&self, key: Value, document: Document) -> StoreResult<DocId> {
        let mut state = self.write_state()?;
        self.put_locked(&mut state, key, document)
    }

    fn put_if_absent(&self, key: Value, document: Document) -> StoreResult<Option<Document>> {
        let canonical = Self::canonical_key(&key)?;
        let mut state = self.write_state()?;
        if let Some(existing) = state
            .keys
            .get(&canonical)
            .and_then(|id| state.documents.get(id))
        {
            return Ok(Some(existing.clone()));
        }
        self.put_locked(&mut state, key, document)?;
        Ok(None)
    }

    /// Entries are applied in order; a failing entry leaves earlier ones in
    /// place.
    fn put_all(&self, entries: Vec<(Value, Document)>) -> StoreResult<()> {
        let mut state = self.write_state()?;
        for (key, document) in entries {
            self.put_locked(&mut state, key, document)?;
        }
        Ok(())
    }

    fn delete(&self, key: &Value) -> StoreResult<Option<Document>> {
        let canonical = Self::canonical_key(key)?;
        let mut state = self.write_state()?;
        let id = match state.keys.remove(&canonical) {
            Some(id) => id,
            None => return Ok(None),
        };
        let removed = state.documents.remove(&id);
        if let Some(doc) = &removed {
            for index in state.indexes.values_mut() {
                index.remove(id, doc, &self.tokenizer);
            }
        }
        Ok(removed)
    }
}

impl IndexedPartitionStore for MemoryPartitionStore {
    fn create_index(&self, field: &str, options: &IndexOptions) -> StoreResult<()> {
        if field.is_empty() {
            return Err(StoreError::invalid_argument("index field cannot be empty"));
        }

        let mut state = self.write_state()?;
        if state.index_type(field).is_some() {
            return Err(StoreError::IndexAlreadyExists {
                field: field.to_string(),
            });
        }

        if options.async_build {
            let pending = state.begin_build(field, options.index_type);
            drop(state);
            self.spawn_build(field.to_string(), pending);
            return Ok(());
        }

        let index = FieldIndex::build(
            field,
            options.index_type,
            state.documents.iter().map(|(id, doc)| (*id, doc)),
            &self.tokenizer,
        )?;
        state.indexes.insert(field.to_string(), index);
        drop(state);

        self.log_index_event(Event::IndexCreated, field);
        Ok(())
    }

    fn rebuild_index(&self, field: &str, async_build: bool) -> StoreResult<()> {
        let mut state = self.write_state()?;
        let index_type = state
            .index_type(field)
            .ok_or_else(|| StoreError::field_not_indexed(field))?;

        if state.building.contains_key(field) {
            return Ok(());
        }

        if async_build {
            let pending = state.begin_build(field, index_type);
            drop(state);
            self.spawn_build(field.to_string(), pending);
            return Ok(());
        }

        let index = FieldIndex::build(
            field,
            index_type,
            state.documents.iter().map(|(id, doc)| (*id, doc)),
            &self.tokenizer,
        )?;
        state.indexes.insert(field.to_string(), index);
        drop(state);

        self.log_index_event(Event::IndexRebuilt, field);
        Ok(())
    }

    fn drop_index(&self, field: &str) -> StoreResult<()> {
        let mut state = self.write_state()?;
        let building = state.building.remove(field).is_some();
        let built = state.indexes.remove(field).is_some();
        drop(state);

        if !building && !built {
            return Err(StoreError::field_not_indexed(field));
        }
        self.log_index_event(Event::IndexDropped, field);
        Ok(())
    }

    fn drop_all_indices(&self) -> StoreResult<()> {
        let mut state = self.write_state()?;
        let fields: BTreeSet<String> = state
            .indexes
            .keys()
            .chain(state.building.keys())
            .cloned()
            .collect();
        state.indexes.clear();
        state.building.clear();
        drop(state);

        for field in &fields {
            self.log_index_event(Event::IndexDropped, field);
        }
        Ok(())
    }

    fn list_indices(&self) -> StoreResult<Vec<IndexDescriptor>> {
        let state = self.read_state()?;
        let mut fields: BTreeMap<&str, IndexType> = state
            .indexes
            .iter()
            .map(|(field, index)| (field.as_str(), index.index_type()))
            .collect();
        fields.extend(state.building.iter().map(|(f, pending)| (f.as_str(), pending.index_type)));

        Ok(fields
            .into_iter()
            .map(|(field, index_type)| IndexDescriptor {
                index_type,
                field: field.to_string(),
                store_name: self.store_name.clone(),
            })
            .collect())
    }

    fn has_index(&self, field: &str) -> StoreResult<bool> {
        Ok(self.read_state()?.index_type(field).is_some())
    }

    fn is_indexing(&self, field: &str) -> StoreResult<bool> {
        Ok(self.read_state()?.building.contains_key(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SortSpec;
    use serde_json::json;
    use std::sync::PoisonError;
    use std::time::{Duration, Instant};

    fn movie(title: &str, year: i64) -> Document {
        Document::new().with("title", title).with("year", year)
    }

    fn store() -> MemoryPartitionStore {
        let store = MemoryPartitionStore::new("movies", 0);
        store
            .put_all(vec![
                (json!("m1"), movie("The Matrix", 1999)),
                (json!("m2"), movie("Speed", 1994)),
                (json!("m3"), movie("Matrix Reloaded", 2003)),
                (json!("m4"), movie("John Wick", 2014)),
            ])
            .unwrap();
        store
    }

    fn titles(result: &LocalResult) -> Vec<String> {
        result
            .iter()
            .map(|(_, d)| d.get("title").and_then(Value::as_str).unwrap().to_string())
            .collect()
    }

    fn wait_for_build(store: &MemoryPartitionStore, field: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while store.is_indexing(field).unwrap() {
            assert!(Instant::now() < deadline, "index build did not finish");
            thread::sleep(Duration::from_millis(5));
        }
    }

    // =========================================================================
    // Writes and point lookups
    // =========================================================================

    #[test]
    fn test_put_writes_key_field() {
        let store = store();
        let doc = store.get(&json!("m2")).unwrap().unwrap();
        assert_eq!(doc.get("_key"), Some(&json!("m2")));
        assert_eq!(doc.get("title"), Some(&json!("Speed")));
        assert_eq!(store.get(&json!("nope")).unwrap(), None);
    }

    #[test]
    fn test_null_key_rejected() {
        let store = store();
        let err = store.get(&Value::Null).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_INVALID_ARGUMENT");
        assert!(store.put(Value::Null, Document::new()).is_err());
    }

    #[test]
    fn test_upsert_keeps_insertion_position() {
        let store = store();
        let first = store.put(json!("m1"), movie("The Matrix (remastered)", 1999)).unwrap();
        assert_eq!(first, 0);

        let page = store.find_page(None, None, 0, 10).unwrap();
        assert_eq!(titles(&page)[0], "The Matrix (remastered)");
        assert_eq!(page.total_count, 4);
    }

    #[test]
    fn test_put_if_absent() {
        let store = store();
        let existing = store.put_if_absent(json!("m2"), movie("Other", 1)).unwrap();
        assert_eq!(existing.unwrap().get("title"), Some(&json!("Speed")));

        assert!(store.put_if_absent(json!("m5"), movie("Heat", 1995)).unwrap().is_none());
        assert_eq!(store.len().unwrap(), 5);
    }

    #[test]
    fn test_delete() {
        let store = store();
        store.create_index("year", &IndexOptions::default()).unwrap();

        let removed = store.delete(&json!("m2")).unwrap().unwrap();
        assert_eq!(removed.get("year"), Some(&json!(1994)));
        assert!(store.delete(&json!("m2")).unwrap().is_none());

        let result = store.find(&Filter::eq("year", 1994)).unwrap();
        assert!(result.is_empty());
    }

    // =========================================================================
    // Scans
    // =========================================================================

    #[test]
    fn test_find_page_insertion_order_and_has_more() {
        let store = store();
        let page = store.find_page(None, None, 1, 2).unwrap();
        assert_eq!(titles(&page), vec!["Speed", "Matrix Reloaded"]);
        assert!(page.has_more);
        assert_eq!(page.total_count, 4);

        let last = store.find_page(None, None, 3, 2).unwrap();
        assert_eq!(titles(&last), vec!["John Wick"]);
        assert!(!last.has_more);
    }

    #[test]
    fn test_find_page_sorted() {
        let store = store();
        let page = store
            .find_page(None, Some(&SortSpec::desc("year")), 0, 2)
            .unwrap();
        assert_eq!(titles(&page), vec!["John Wick", "Matrix Reloaded"]);
    }

    #[test]
    fn test_offset_at_end_is_empty_page() {
        let store = store();
        let page = store.find_page(None, None, 4, 2).unwrap();
        assert!(page.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.total_count, 4);
    }

    #[test]
    fn test_offset_past_end_rejected() {
        let store = store();
        let err = store.find_page(None, None, 5, 2).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_INVALID_ARGUMENT");
    }

    #[test]
    fn test_zero_size_rejected() {
        let store = store();
        assert!(store.find_page(None, None, 0, 0).is_err());
    }

    #[test]
    fn test_sort_on_list_not_comparable() {
        let store = store();
        store
            .put(json!("m9"), Document::new().with("year", json!([1, 2])))
            .unwrap();
        let err = store
            .find_page(None, Some(&SortSpec::asc("year")), 0, 10)
            .unwrap_err();
        assert_eq!(err, StoreError::not_comparable("year"));
    }

    #[test]
    fn test_indexed_and_scanned_results_agree() {
        let scanned = store();
        let indexed = store();
        indexed.create_index("year", &IndexOptions::default()).unwrap();

        let filter = Filter::or(vec![Filter::eq("year", 1994), Filter::is_in("year", vec![json!(2003.0)])]);
        assert_eq!(
            scanned.find(&filter).unwrap().ids,
            indexed.find(&filter).unwrap().ids
        );
        assert_eq!(indexed.find(&filter).unwrap().total_count, 2);
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    #[test]
    fn test_text_filter_requires_fulltext_index() {
        let store = store();
        let err = store.find(&Filter::text("title", "matrix")).unwrap_err();
        assert_eq!(err, StoreError::field_not_indexed("title"));

        store.create_index("title", &IndexOptions::fulltext()).unwrap();
        let result = store.find(&Filter::text("title", "matrix")).unwrap();
        assert_eq!(titles(&result), vec!["The Matrix", "Matrix Reloaded"]);
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let store = store();
        store.create_index("year", &IndexOptions::unique()).unwrap();
        let err = store.create_index("year", &IndexOptions::default()).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_INDEX_EXISTS");
    }

    #[test]
    fn test_unique_index_rejects_duplicate_write() {
        let store = store();
        store.create_index("year", &IndexOptions::unique()).unwrap();

        let err = store.put(json!("m5"), movie("Clone", 1999)).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_UNIQUE_VIOLATION");
        assert!(store.get(&json!("m5")).unwrap().is_none());

        // Rewriting the owner of the value is fine
        store.put(json!("m1"), movie("The Matrix", 1999)).unwrap();
    }

    #[test]
    fn test_drop_and_list_indices() {
        let store = store();
        store.create_index("year", &IndexOptions::default()).unwrap();
        store.create_index("title", &IndexOptions::fulltext()).unwrap();

        let fields: Vec<_> = store
            .list_indices()
            .unwrap()
            .into_iter()
            .map(|d| (d.field, d.index_type))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("title".to_string(), IndexType::Fulltext),
                ("year".to_string(), IndexType::NonUnique)
            ]
        );

        store.drop_index("year").unwrap();
        assert!(!store.has_index("year").unwrap());
        assert_eq!(
            store.drop_index("year").unwrap_err(),
            StoreError::field_not_indexed("year")
        );

        store.drop_all_indices().unwrap();
        assert!(store.list_indices().unwrap().is_empty());
    }

    #[test]
    fn test_async_build_completes() {
        let store = store();
        store
            .create_index("title", &IndexOptions::fulltext().with_async_build(true))
            .unwrap();
        assert!(store.has_index("title").unwrap());

        wait_for_build(&store, "title");
        let result = store.find(&Filter::text("title", "speed")).unwrap();
        assert_eq!(titles(&result), vec!["Speed"]);
    }

    #[test]
    fn test_recreate_while_building() {
        let store = store();
        store
            .create_index("title", &IndexOptions::unique().with_async_build(true))
            .unwrap();
        store.drop_index("title").unwrap();
        store
            .create_index("title", &IndexOptions::fulltext().with_async_build(true))
            .unwrap();

        wait_for_build(&store, "title");
        let listed = store.list_indices().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].index_type, IndexType::Fulltext);
        assert_eq!(store.find(&Filter::text("title", "matrix")).unwrap().len(), 2);
    }

    #[test]
    fn test_superseded_build_is_discarded() {
        let store = store();
        let stale = store.state.write().unwrap().begin_build("title", IndexType::Unique);
        store.state.write().unwrap().building.remove("title");
        let current = store.state.write().unwrap().begin_build("title", IndexType::Fulltext);

        run_build(&store.state, &store.tokenizer, "title", stale, &[]);
        assert!(store.is_indexing("title").unwrap());
        assert!(store.state.read().unwrap().indexes.is_empty());

        run_build(&store.state, &store.tokenizer, "title", current, &[]);
        assert!(!store.is_indexing("title").unwrap());
        assert_eq!(store.list_indices().unwrap()[0].index_type, IndexType::Fulltext);
    }

    #[test]
    fn test_build_on_poisoned_state_clears_pending() {
        let store = store();
        let pending = store.state.write().unwrap().begin_build("year", IndexType::NonUnique);

        let state = Arc::clone(&store.state);
        let _ = thread::spawn(move || {
            let _guard = state.write().unwrap();
            panic!("writer failed mid-update");
        })
        .join();

        run_build(&store.state, &store.tokenizer, "year", pending, &[]);
        let state = store.state.read().unwrap_or_else(PoisonError::into_inner);
        assert!(state.building.is_empty());
        assert!(state.indexes.is_empty());
    }

    #[test]
    fn test_rebuild_index() {
        let store = store();
        assert_eq!(
            store.rebuild_index("year", false).unwrap_err(),
            StoreError::field_not_indexed("year")
        );

        store.create_index("year", &IndexOptions::default()).unwrap();
        store.rebuild_index("year", false).unwrap();
        store.rebuild_index("year", true).unwrap();
        wait_for_build(&store, "year");
        assert_eq!(store.find(&Filter::eq("year", 2014)).unwrap().len(), 1);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[test]
    fn test_closed_store_unavailable() {
        let store = store();
        let handle = store.clone();
        store.close();

        let err = handle.find_page(None, None, 0, 1).unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(err.to_string(), "Store movies is currently closed");
        assert!(handle.partition_id().is_err());
        assert!(handle.get(&json!("m1")).unwrap_err().is_unavailable());
    }
}
