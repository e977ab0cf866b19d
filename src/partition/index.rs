//! Per-partition field indexes
//!
//! Indexes are derived state: they are built from, and always mirror, the
//! partition's documents. `BTreeMap` keys give deterministic ordering and
//! id lists are kept sorted ascending.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{DocId, Document, TextTerm, TextTokenizer};
use crate::errors::{StoreError, StoreResult};

/// Kind of index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// At most one document per value
    Unique,
    NonUnique,
    /// Token index over string values, required by `text` filters
    Fulltext,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexType::Unique => "unique",
            IndexType::NonUnique => "non_unique",
            IndexType::Fulltext => "fulltext",
        };
        write!(f, "{}", name)
    }
}

/// Options for index creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    pub index_type: IndexType,
    /// Build on a background thread
    #[serde(default)]
    pub async_build: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::new(IndexType::NonUnique)
    }
}

impl IndexOptions {
    pub fn new(index_type: IndexType) -> Self {
        Self {
            index_type,
            async_build: false,
        }
    }

    pub fn unique() -> Self {
        Self::new(IndexType::Unique)
    }

    pub fn fulltext() -> Self {
        Self::new(IndexType::Fulltext)
    }

    pub fn with_async_build(mut self, async_build: bool) -> Self {
        self.async_build = async_build;
        self
    }
}

/// Describes an index as reported by `list_indices`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub index_type: IndexType,
    pub field: String,
    pub store_name: String,
}

/// Index key representing a scalar field value.
///
/// Ordering is deterministic: Bool < Int < Float < String. Integral floats
/// are stored as `Int` so that `1999` and `1999.0` share a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    /// f64 bits rearranged for total ordering
    Float(u64),
    String(String),
}

impl IndexKey {
    pub fn from_float(v: f64) -> Self {
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            return IndexKey::Int(v as i64);
        }
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        IndexKey::Float(ordered)
    }

    /// Create a key from a JSON value; lists, objects and null have none
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::Int(i))
                } else {
                    n.as_f64().map(IndexKey::from_float)
                }
            }
            Value::String(s) => Some(IndexKey::String(s.clone())),
            _ => None,
        }
    }
}

/// Keys a document contributes for `field`; list elements are indexed
/// individually.
fn value_keys(doc: &Document, field: &str) -> Vec<IndexKey> {
    match doc.field(field) {
        Some(Value::Array(items)) => items.iter().filter_map(IndexKey::from_json).collect(),
        Some(value) => IndexKey::from_json(value).into_iter().collect(),
        None => Vec::new(),
    }
}

fn insert_sorted(ids: &mut Vec<DocId>, id: DocId) {
    if let Err(pos) = ids.binary_search(&id) {
        ids.insert(pos, id);
    }
}

fn remove_sorted(ids: &mut Vec<DocId>, id: DocId) {
    if let Ok(pos) = ids.binary_search(&id) {
        ids.remove(pos);
    }
}

/// An index over one field of one partition
#[derive(Debug, Clone)]
pub struct FieldIndex {
    field: String,
    index_type: IndexType,
    /// Value index (unique and non-unique)
    values: BTreeMap<IndexKey, Vec<DocId>>,
    /// Token index (full-text)
    tokens: BTreeMap<String, Vec<DocId>>,
}

impl FieldIndex {
    /// Creates an empty index
    pub fn new(field: impl Into<String>, index_type: IndexType) -> Self {
        Self {
            field: field.into(),
            index_type,
            values: BTreeMap::new(),
            tokens: BTreeMap::new(),
        }
    }

    /// Builds an index over existing documents
    pub fn build<'a>(
        field: &str,
        index_type: IndexType,
        documents: impl IntoIterator<Item = (DocId, &'a Document)>,
        tokenizer: &TextTokenizer,
    ) -> StoreResult<Self> {
        let mut index = Self::new(field, index_type);
        for (id, doc) in documents {
            index.check_insert(id, doc)?;
            index.insert(id, doc, tokenizer);
        }
        Ok(index)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Fails if inserting `doc` under `id` would break a unique index
    pub fn check_insert(&self, id: DocId, doc: &Document) -> StoreResult<()> {
        if self.index_type != IndexType::Unique {
            return Ok(());
        }
        for key in value_keys(doc, &self.field) {
            if let Some(ids) = self.values.get(&key) {
                if ids.iter().any(|existing| *existing != id) {
                    let value = doc
                        .field(&self.field)
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    return Err(StoreError::UniqueConstraintViolation {
                        field: self.field.clone(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, id: DocId, doc: &Document, tokenizer: &TextTokenizer) {
        match self.index_type {
            IndexType::Fulltext => {
                for token in self.text_tokens(doc, tokenizer) {
                    insert_sorted(self.tokens.entry(token).or_default(), id);
                }
            }
            IndexType::Unique | IndexType::NonUnique => {
                for key in value_keys(doc, &self.field) {
                    insert_sorted(self.values.entry(key).or_default(), id);
                }
            }
        }
    }

    pub fn remove(&mut self, id: DocId, doc: &Document, tokenizer: &TextTokenizer) {
        match self.index_type {
            IndexType::Fulltext => {
                for token in self.text_tokens(doc, tokenizer) {
                    if let Some(ids) = self.tokens.get_mut(&token) {
                        remove_sorted(ids, id);
                        if ids.is_empty() {
                            self.tokens.remove(&token);
                        }
                    }
                }
            }
            IndexType::Unique | IndexType::NonUnique => {
                for key in value_keys(doc, &self.field) {
                    if let Some(ids) = self.values.get_mut(&key) {
                        remove_sorted(ids, id);
                        if ids.is_empty() {
                            self.values.remove(&key);
                        }
                    }
                }
            }
        }
    }

    /// Candidate ids for an equality match, sorted ascending.
    ///
    /// Returns `None` when the index cannot answer (full-text index, or a
    /// value that has no index key).
    pub fn lookup_eq(&self, value: &Value) -> Option<Vec<DocId>> {
        if self.index_type == IndexType::Fulltext {
            return None;
        }
        let key = IndexKey::from_json(value)?;
        Some(self.values.get(&key).cloned().unwrap_or_default())
    }

    /// Candidate ids for a full-text query, sorted ascending
    pub fn lookup_text(&self, terms: &[TextTerm]) -> Vec<DocId> {
        let mut ids = BTreeSet::new();
        for term in terms {
            match term {
                TextTerm::Exact(t) => {
                    if let Some(found) = self.tokens.get(t) {
                        ids.extend(found.iter().copied());
                    }
                }
                TextTerm::Prefix(t) => {
                    for (_, found) in self
                        .tokens
                        .range(t.clone()..)
                        .take_while(|(token, _)| token.starts_with(t.as_str()))
                    {
                        ids.extend(found.iter().copied());
                    }
                }
                TextTerm::Suffix(_) | TextTerm::Contains(_) => {
                    for (_, found) in self.tokens.iter().filter(|(token, _)| term.matches_token(token)) {
                        ids.extend(found.iter().copied());
                    }
                }
            }
        }
        ids.into_iter().collect()
    }

    fn text_tokens(&self, doc: &Document, tokenizer: &TextTokenizer) -> BTreeSet<String> {
        match doc.field(&self.field) {
            Some(Value::String(text)) => tokenizer.tokenize(text),
            _ => BTreeSet::new(),
        }
    }
}
