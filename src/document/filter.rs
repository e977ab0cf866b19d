//! Filter trees and their evaluation
//!
//! Filters are evaluated identically by every partition. Matching rules:
//! - Missing or null fields never satisfy a comparison
//! - `eq null` matches a missing or null field
//! - No type coercion, except that integers and floats compare numerically
//! - Strings compare lexicographically, booleans `false < true`

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::Document;
use super::sort::{compare_numbers, compare_scalars};
use super::text::TextTokenizer;
use crate::errors::{StoreError, StoreResult};

/// Field name used for scalar list elements inside `elem_match`
pub const ELEMENT_FIELD: &str = "$";

/// A predicate tree over document fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// Matches every document
    All,
    Eq { field: String, value: Value },
    Ne { field: String, value: Value },
    Gt { field: String, value: Value },
    Gte { field: String, value: Value },
    Lt { field: String, value: Value },
    Lte { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    NotIn { field: String, values: Vec<Value> },
    /// Full-text search, requires a full-text index on `field`
    Text { field: String, query: String },
    Regex { field: String, pattern: String },
    /// Matches if any element of the list at `field` matches `filter`
    ElemMatch { field: String, filter: Box<Filter> },
    And { filters: Vec<Filter> },
    Or { filters: Vec<Filter> },
    Not { filter: Box<Filter> },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In {
            field: field.into(),
            values,
        }
    }

    pub fn not_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::NotIn {
            field: field.into(),
            values,
        }
    }

    pub fn text(field: impl Into<String>, query: impl Into<String>) -> Self {
        Filter::Text {
            field: field.into(),
            query: query.into(),
        }
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Regex {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn elem_match(field: impl Into<String>, filter: Filter) -> Self {
        Filter::ElemMatch {
            field: field.into(),
            filter: Box::new(filter),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { filters }
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { filters }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not {
            filter: Box::new(filter),
        }
    }

    /// Checks the tree for malformed nodes without touching any data.
    pub fn validate(&self) -> StoreResult<()> {
        self.walk(&mut |node: &Filter| {
            if let Some(field) = node.field() {
                if field.is_empty() {
                    return Err(StoreError::invalid_argument(format!(
                        "{} filter requires a field name",
                        node.op_name()
                    )));
                }
            }
            match node {
                Filter::And { filters } | Filter::Or { filters } if filters.is_empty() => Err(
                    StoreError::invalid_argument(format!("{} filter requires operands", node.op_name())),
                ),
                Filter::Regex { pattern, .. } => Regex::new(pattern).map(|_| ()).map_err(|e| {
                    StoreError::invalid_argument(format!("invalid regex '{}': {}", pattern, e))
                }),
                _ => Ok(()),
            }
        })
    }

    /// Fields that full-text filters in this tree search on
    pub fn text_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_text_fields(&mut fields);
        fields
    }

    fn collect_text_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Text { field, .. } => out.push(field),
            Filter::And { filters } | Filter::Or { filters } => {
                filters.iter().for_each(|f| f.collect_text_fields(out))
            }
            Filter::Not { filter } => filter.collect_text_fields(out),
            // elem_match operands address list elements, not indexed fields
            _ => {}
        }
    }

    /// Returns the field this node tests, if it is a leaf
    pub fn field(&self) -> Option<&str> {
        match self {
            Filter::Eq { field, .. }
            | Filter::Ne { field, .. }
            | Filter::Gt { field, .. }
            | Filter::Gte { field, .. }
            | Filter::Lt { field, .. }
            | Filter::Lte { field, .. }
            | Filter::In { field, .. }
            | Filter::NotIn { field, .. }
            | Filter::Text { field, .. }
            | Filter::Regex { field, .. }
            | Filter::ElemMatch { field, .. } => Some(field),
            Filter::All | Filter::And { .. } | Filter::Or { .. } | Filter::Not { .. } => None,
        }
    }

    /// Returns the operation name
    pub fn op_name(&self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Eq { .. } => "eq",
            Filter::Ne { .. } => "ne",
            Filter::Gt { .. } => "gt",
            Filter::Gte { .. } => "gte",
            Filter::Lt { .. } => "lt",
            Filter::Lte { .. } => "lte",
            Filter::In { .. } => "in",
            Filter::NotIn { .. } => "not_in",
            Filter::Text { .. } => "text",
            Filter::Regex { .. } => "regex",
            Filter::ElemMatch { .. } => "elem_match",
            Filter::And { .. } => "and",
            Filter::Or { .. } => "or",
            Filter::Not { .. } => "not",
        }
    }

    fn walk<F>(&self, visit: &mut F) -> StoreResult<()>
    where
        F: FnMut(&Filter) -> StoreResult<()>,
    {
        visit(self)?;
        match self {
            Filter::And { filters } | Filter::Or { filters } => {
                filters.iter().try_for_each(|f| f.walk(visit))
            }
            Filter::Not { filter } | Filter::ElemMatch { filter, .. } => filter.walk(visit),
            _ => Ok(()),
        }
    }
}

/// Evaluates a filter against documents.
///
/// Regular expressions are compiled once per evaluator.
pub struct FilterEvaluator<'a> {
    filter: &'a Filter,
    tokenizer: &'a TextTokenizer,
    regexes: HashMap<String, Regex>,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(filter: &'a Filter, tokenizer: &'a TextTokenizer) -> StoreResult<Self> {
        filter.validate()?;

        let mut regexes = HashMap::new();
        filter.walk(&mut |node: &Filter| {
            if let Filter::Regex { pattern, .. } = node {
                if !regexes.contains_key(pattern) {
                    let compiled = Regex::new(pattern).map_err(|e| {
                        StoreError::invalid_argument(format!("invalid regex '{}': {}", pattern, e))
                    })?;
                    regexes.insert(pattern.clone(), compiled);
                }
            }
            Ok(())
        })?;

        Ok(Self {
            filter,
            tokenizer,
            regexes,
        })
    }

    /// Checks if a document matches the filter
    pub fn matches(&self, document: &Document) -> bool {
        self.matches_node(self.filter, document)
    }

    fn matches_node(&self, filter: &Filter, document: &Document) -> bool {
        match filter {
            Filter::All => true,
            Filter::Eq { field, value } => Self::eq_match(document.field(field), value),
            Filter::Ne { field, value } => !Self::eq_match(document.field(field), value),
            Filter::Gt { field, value } => {
                Self::cmp_match(document.field(field), value, |o| o.is_gt())
            }
            Filter::Gte { field, value } => {
                Self::cmp_match(document.field(field), value, |o| o.is_ge())
            }
            Filter::Lt { field, value } => {
                Self::cmp_match(document.field(field), value, |o| o.is_lt())
            }
            Filter::Lte { field, value } => {
                Self::cmp_match(document.field(field), value, |o| o.is_le())
            }
            Filter::In { field, values } => {
                let actual = document.field(field);
                values.iter().any(|v| Self::eq_match(actual, v))
            }
            Filter::NotIn { field, values } => {
                let actual = document.field(field);
                !values.iter().any(|v| Self::eq_match(actual, v))
            }
            Filter::Text { field, query } => self.text_match(document.field(field), query),
            Filter::Regex { field, pattern } => match document.field(field) {
                Some(Value::String(s)) => self
                    .regexes
                    .get(pattern.as_str())
                    .map(|re| re.is_match(s))
                    .unwrap_or(false),
                _ => false,
            },
            Filter::ElemMatch { field, filter } => match document.field(field) {
                Some(Value::Array(items)) => items.iter().any(|item| {
                    let element = match item {
                        Value::Object(map) => Document::from(map.clone()),
                        scalar => Document::new().with(ELEMENT_FIELD, scalar.clone()),
                    };
                    self.matches_node(filter, &element)
                }),
                _ => false,
            },
            Filter::And { filters } => filters.iter().all(|f| self.matches_node(f, document)),
            Filter::Or { filters } => filters.iter().any(|f| self.matches_node(f, document)),
            Filter::Not { filter } => !self.matches_node(filter, document),
        }
    }

    /// Exact equality, numbers compared numerically
    fn eq_match(actual: Option<&Value>, expected: &Value) -> bool {
        match (actual, expected) {
            (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
            (None, _) => false,
            (Some(Value::Number(a)), Value::Number(b)) => compare_numbers(a, b).is_eq(),
            (Some(a), b) => a == b,
        }
    }

    /// Ordered comparison between values of the same kind
    fn cmp_match(
        actual: Option<&Value>,
        bound: &Value,
        accept: impl Fn(std::cmp::Ordering) -> bool,
    ) -> bool {
        match (actual, bound) {
            (Some(a @ Value::Number(_)), Value::Number(_))
            | (Some(a @ Value::String(_)), Value::String(_))
            | (Some(a @ Value::Bool(_)), Value::Bool(_)) => accept(compare_scalars(a, bound, None)),
            _ => false,
        }
    }

    fn text_match(&self, actual: Option<&Value>, query: &str) -> bool {
        let text = match actual {
            Some(Value::String(s)) => s,
            _ => return false,
        };
        let terms = self.tokenizer.query_terms(query);
        if terms.is_empty() {
            return false;
        }
        let tokens = self.tokenizer.tokenize(text);
        terms
            .iter()
            .any(|term| tokens.iter().any(|token| term.matches_token(token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movie() -> Document {
        Document::from_value(json!({
            "code": "MTRX1",
            "title": "The Matrix",
            "year": 1999,
            "rating": 8.7,
            "tags": ["action", "sci-fi"],
            "cast": [{"name": "Keanu", "role": "Neo"}],
            "sequel": null
        }))
        .unwrap()
    }

    fn matches(filter: Filter) -> bool {
        let tokenizer = TextTokenizer::default();
        FilterEvaluator::new(&filter, &tokenizer)
            .unwrap()
            .matches(&movie())
    }

    #[test]
    fn test_equality_match() {
        assert!(matches(Filter::eq("title", "The Matrix")));
        assert!(!matches(Filter::eq("title", "Speed")));
    }

    #[test]
    fn test_no_type_coercion() {
        assert!(!matches(Filter::eq("year", "1999")));
        assert!(matches(Filter::eq("year", 1999)));
        assert!(matches(Filter::eq("year", 1999.0)));
    }

    #[test]
    fn test_null_equality() {
        assert!(matches(Filter::eq("sequel", Value::Null)));
        assert!(matches(Filter::eq("missing", Value::Null)));
        assert!(!matches(Filter::eq("year", Value::Null)));
    }

    #[test]
    fn test_range_predicates() {
        assert!(matches(Filter::gt("year", 1998)));
        assert!(matches(Filter::gte("year", 1999)));
        assert!(!matches(Filter::lt("year", 1999)));
        assert!(matches(Filter::lte("rating", 8.7)));
        assert!(matches(Filter::lt("title", "Top Gun")));
        assert!(!matches(Filter::gt("year", "1000")));
    }

    #[test]
    fn test_missing_field_no_match() {
        assert!(!matches(Filter::gt("budget", 0)));
        assert!(!matches(Filter::lt("budget", 0)));
    }

    #[test]
    fn test_membership() {
        assert!(matches(Filter::is_in("code", vec![json!("SPEED"), json!("MTRX1")])));
        assert!(!matches(Filter::not_in("code", vec![json!("MTRX1")])));
        assert!(matches(Filter::not_in("missing", vec![json!(1)])));
    }

    #[test]
    fn test_boolean_combinators() {
        assert!(matches(Filter::and(vec![
            Filter::gte("year", 1990),
            Filter::or(vec![Filter::eq("code", "X"), Filter::eq("code", "MTRX1")]),
        ])));
        assert!(!matches(Filter::not(Filter::All)));
    }

    #[test]
    fn test_text_match() {
        assert!(matches(Filter::text("title", "the matrix")));
        assert!(matches(Filter::text("title", "matr*")));
        assert!(!matches(Filter::text("title", "reloaded")));
        assert!(!matches(Filter::text("title", "the")));
    }

    #[test]
    fn test_regex_match() {
        assert!(matches(Filter::regex("code", "^MTRX\\d$")));
        assert!(!matches(Filter::regex("year", "1999")));
    }

    #[test]
    fn test_elem_match() {
        assert!(matches(Filter::elem_match("tags", Filter::eq(ELEMENT_FIELD, "sci-fi"))));
        assert!(matches(Filter::elem_match("cast", Filter::eq("role", "Neo"))));
        assert!(!matches(Filter::elem_match("title", Filter::All)));
    }

    #[test]
    fn test_validate_rejects_malformed_filters() {
        assert!(Filter::eq("", 1).validate().is_err());
        assert!(Filter::and(vec![]).validate().is_err());
        assert!(Filter::regex("code", "(").validate().is_err());
        assert!(Filter::not(Filter::eq("a", 1)).validate().is_ok());
    }

    #[test]
    fn test_text_fields_collected() {
        let filter = Filter::and(vec![
            Filter::text("title", "matrix"),
            Filter::not(Filter::text("plot", "spoon")),
            Filter::eq("year", 1999),
        ]);
        assert_eq!(filter.text_fields(), vec!["title", "plot"]);
    }

    #[test]
    fn test_filter_json_shape() {
        let filter: Filter = serde_json::from_value(json!({
            "op": "and",
            "filters": [
                {"op": "gt", "field": "year", "value": 2000},
                {"op": "in", "field": "code", "values": ["A", "B"]}
            ]
        }))
        .unwrap();
        assert_eq!(
            filter,
            Filter::and(vec![
                Filter::gt("year", 2000),
                Filter::is_in("code", vec![json!("A"), json!("B")]),
            ])
        );
    }
}
