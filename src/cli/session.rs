//! Query session
//!
//! Owns the partitions of one logical store, loaded from the configured
//! dataset, and answers JSON requests against them through the composite
//! facades.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::errors::{CliError, CliResult};
use crate::composite::{
    CompositeDocumentStore, CompositeIndexedStore, CompositeResult, PaginationToken,
};
use crate::config::DocshardConfig;
use crate::document::{Document, Filter, SortSpec};
use crate::errors::{StoreError, StoreResult};
use crate::locator::{PartitionRegistry, Partitioner};
use crate::observability::{log_event_with_fields, Event};
use crate::partition::{IndexOptions, IndexedPartitionStore, MemoryPartitionStore, WritablePartitionStore};

type Registry = Arc<PartitionRegistry<dyn IndexedPartitionStore>>;

/// One request line
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Get {
        key: Value,
    },
    Find {
        #[serde(default)]
        filter: Option<Filter>,
    },
    /// Either `token` resumes a previous page, or `size`/`sort` start a new one
    FindPage {
        #[serde(default)]
        filter: Option<Filter>,
        #[serde(default)]
        token: Option<PaginationToken>,
        #[serde(default)]
        size: Option<usize>,
        #[serde(default)]
        sort: Option<SortSpec>,
    },
    CreateIndex {
        field: String,
        #[serde(default)]
        options: IndexOptions,
    },
    RebuildIndex {
        field: String,
        #[serde(default)]
        async_build: bool,
    },
    DropIndex {
        field: String,
    },
    DropAllIndices,
    ListIndices,
    HasIndex {
        field: String,
    },
    IsIndexing {
        field: String,
    },
}

impl Request {
    pub fn parse(value: &Value) -> StoreResult<Self> {
        Request::deserialize(value)
            .map_err(|e| StoreError::invalid_argument(format!("Invalid request: {}", e)))
    }
}

/// Partitions of one store plus the facades over them
pub struct QuerySession {
    config: DocshardConfig,
    partitioner: Partitioner,
    partitions: Vec<MemoryPartitionStore>,
    documents: CompositeDocumentStore<Registry>,
    indexes: CompositeIndexedStore<Registry>,
}

impl QuerySession {
    /// Creates empty partitions for `config`
    pub fn new(config: DocshardConfig) -> CliResult<Self> {
        let partitioner = Partitioner::new(config.partitions)?;
        let registry: Registry = Arc::new(PartitionRegistry::new());

        let mut partitions = Vec::with_capacity(config.partitions as usize);
        for partition in 0..config.partitions {
            let store = MemoryPartitionStore::new(config.store_name.clone(), partition)
                .with_key_field(config.key_field.clone())
                .with_tokenizer(config.tokenizer());
            registry.register(Arc::new(store.clone()))?;
            partitions.push(store);
        }

        let documents = CompositeDocumentStore::new(config.store_name.clone(), Arc::clone(&registry))
            .with_fanout(config.fanout_mode())
            .with_max_page_size(config.max_page_size);
        let indexes = CompositeIndexedStore::new(config.store_name.clone(), registry)
            .with_fanout(config.fanout_mode());

        Ok(Self {
            config,
            partitioner,
            partitions,
            documents,
            indexes,
        })
    }

    /// Creates the partitions and loads the configured dataset, if any
    pub fn open(config: DocshardConfig) -> CliResult<Self> {
        let data_file = config.data_file.clone();
        let session = Self::new(config)?;
        if let Some(path) = data_file {
            session.load_file(&path)?;
        }
        Ok(session)
    }

    pub fn config(&self) -> &DocshardConfig {
        &self.config
    }

    pub fn documents(&self) -> &CompositeDocumentStore<Registry> {
        &self.documents
    }

    pub fn indexes(&self) -> &CompositeIndexedStore<Registry> {
        &self.indexes
    }

    /// Stores one document in the partition its key routes to
    pub fn insert(&self, document: Document) -> StoreResult<()> {
        let key = document
            .get(&self.config.key_field)
            .filter(|key| !key.is_null())
            .cloned()
            .ok_or_else(|| {
                StoreError::invalid_argument(format!(
                    "document has no '{}' key",
                    self.config.key_field
                ))
            })?;
        let partition = self.partitioner.partition_for(&key)?;
        self.partitions[partition as usize].put(key, document)?;
        Ok(())
    }

    /// Loads a JSON-lines dataset. Blank lines are skipped.
    pub fn load_file(&self, path: &Path) -> CliResult<usize> {
        let file = File::open(path).map_err(|e| {
            CliError::dataset_error(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let mut loaded = 0;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&line).map_err(|e| {
                CliError::dataset_error(format!("line {}: {}", number + 1, e))
            })?;
            Document::from_value(value)
                .and_then(|doc| self.insert(doc))
                .map_err(|e| CliError::dataset_error(format!("line {}: {}", number + 1, e)))?;
            loaded += 1;
        }

        let path = path.display().to_string();
        let count = loaded.to_string();
        log_event_with_fields(
            Event::DatasetLoaded,
            &[
                ("store", self.config.store_name.as_str()),
                ("path", path.as_str()),
                ("documents", count.as_str()),
            ],
        );
        Ok(loaded)
    }

    /// Parses and executes one request
    pub fn handle(&self, request: &Value) -> StoreResult<Value> {
        self.execute(Request::parse(request)?)
    }

    pub fn execute(&self, request: Request) -> StoreResult<Value> {
        match request {
            Request::Get { key } => {
                let found = self.documents.get(&key)?;
                Ok(found.map(Document::into_value).unwrap_or(Value::Null))
            }
            Request::Find { filter } => {
                let result = self.documents.find(&filter.unwrap_or(Filter::All))?;
                Ok(json!({
                    "documents": result.to_list(),
                    "total_count": result.total_count(),
                }))
            }
            Request::FindPage {
                filter,
                token,
                size,
                sort,
            } => {
                let token = match token {
                    Some(token) => token,
                    None => {
                        let token = PaginationToken::first_page(
                            size.unwrap_or(self.config.default_page_size),
                        )?;
                        match sort {
                            Some(sort) => token.with_sort(sort),
                            None => token,
                        }
                    }
                };
                let result = match &filter {
                    Some(filter) => self.documents.find_page_with_filter(filter, &token)?,
                    None => self.documents.find_page(&token)?,
                };
                page_response(&result, &token)
            }
            Request::CreateIndex { field, options } => {
                self.indexes.create_index(&field, &options)?;
                Ok(json!({ "created": field }))
            }
            Request::RebuildIndex { field, async_build } => {
                self.indexes.rebuild_index(&field, async_build)?;
                Ok(json!({ "rebuilt": field, "async_build": async_build }))
            }
            Request::DropIndex { field } => {
                self.indexes.drop_index(&field)?;
                Ok(json!({ "dropped": field }))
            }
            Request::DropAllIndices => {
                self.indexes.drop_all_indices()?;
                Ok(json!({ "dropped_all": true }))
            }
            Request::ListIndices => Ok(serde_json::to_value(self.indexes.list_indices()?)?),
            Request::HasIndex { field } => Ok(serde_json::to_value(self.indexes.has_index(&field)?)?),
            Request::IsIndexing { field } => {
                Ok(serde_json::to_value(self.indexes.is_indexing(&field)?)?)
            }
        }
    }
}

fn page_response(result: &CompositeResult, token: &PaginationToken) -> StoreResult<Value> {
    let next_token = result
        .next_token()
        .cloned()
        .unwrap_or_else(|| token.next(result.next_offsets().clone()));
    let ids: Vec<String> = result.ordered_ids().iter().map(|id| id.to_string()).collect();

    Ok(json!({
        "ids": ids,
        "documents": result.to_list(),
        "has_more": result.has_more(),
        "total_count": result.total_count(),
        "next_token": serde_json::to_value(next_token)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn session() -> QuerySession {
        let config = DocshardConfig {
            store_name: "movies".into(),
            partitions: 3,
            default_page_size: 2,
            ..DocshardConfig::default()
        };
        let session = QuerySession::new(config).unwrap();
        for (key, title, year) in [
            ("m1", "Heat", 1995),
            ("m2", "Ronin", 1998),
            ("m3", "Alien", 1979),
            ("m4", "Arrival", 2016),
            ("m5", "Brazil", 1985),
        ] {
            session
                .insert(Document::new().with("_key", key).with("title", title).with("year", year))
                .unwrap();
        }
        session
    }

    #[test]
    fn test_get_request() {
        let session = session();
        let doc = session.handle(&json!({"op": "get", "key": "m4"})).unwrap();
        assert_eq!(doc["title"], "Arrival");
        assert_eq!(session.handle(&json!({"op": "get", "key": "nope"})).unwrap(), Value::Null);
    }

    #[test]
    fn test_paging_with_returned_token() {
        let session = session();
        let first = session
            .handle(&json!({
                "op": "find_page",
                "sort": {"field": "year", "order": "ascending"},
            }))
            .unwrap();
        assert_eq!(first["documents"][0]["title"], "Alien");
        assert_eq!(first["documents"][1]["title"], "Brazil");
        assert_eq!(first["has_more"], true);
        assert_eq!(first["total_count"], 5);

        let second = session
            .handle(&json!({"op": "find_page", "token": first["next_token"]}))
            .unwrap();
        assert_eq!(second["documents"][0]["title"], "Heat");
        assert_eq!(second["documents"][1]["title"], "Ronin");
    }

    #[test]
    fn test_find_with_filter() {
        let session = session();
        let found = session
            .handle(&json!({"op": "find", "filter": {"op": "gte", "field": "year", "value": 1995}}))
            .unwrap();
        assert_eq!(found["total_count"], 3);
    }

    #[test]
    fn test_index_requests() {
        let session = session();
        session
            .handle(&json!({"op": "create_index", "field": "title", "options": {"index_type": "fulltext"}}))
            .unwrap();
        let has = session.handle(&json!({"op": "has_index", "field": "title"})).unwrap();
        assert_eq!(has, json!({"0": true, "1": true, "2": true}));

        session.handle(&json!({"op": "drop_all_indices"})).unwrap();
        let listed = session.handle(&json!({"op": "list_indices"})).unwrap();
        assert_eq!(listed, json!({"0": [], "1": [], "2": []}));
    }

    #[test]
    fn test_unknown_op_is_invalid_argument() {
        let err = session().handle(&json!({"op": "explode"})).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_INVALID_ARGUMENT");
    }

    #[test]
    fn test_insert_requires_key() {
        let err = session().insert(Document::new().with("title", "Keyless")).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_INVALID_ARGUMENT");
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"_key": "a", "n": 1}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"_key": "b", "n": 2}}"#).unwrap();

        let config = DocshardConfig {
            data_file: Some(file.path().to_path_buf()),
            ..DocshardConfig::default()
        };
        let session = QuerySession::open(config).unwrap();
        let found = session.handle(&json!({"op": "find"})).unwrap();
        assert_eq!(found["total_count"], 2);
    }

    #[test]
    fn test_load_file_reports_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"_key": "a"}}"#).unwrap();
        writeln!(file, "[1, 2]").unwrap();

        let session = QuerySession::new(DocshardConfig::default()).unwrap();
        let err = session.load_file(file.path()).unwrap_err();
        assert_eq!(err.code_str(), "DOCSHARD_CLI_DATASET_ERROR");
        assert!(err.message().starts_with("line 2"));
    }
}
