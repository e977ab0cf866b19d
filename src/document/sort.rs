//! Sort specifications and value ordering
//!
//! The same ordering is used by a partition when it sorts its local page and
//! by the merge engine when it orders the union of all partitions' pages.
//! Both must agree, otherwise the merged page is not the global top-N.
//!
//! Ordering rules for present values:
//! - bool < number < string
//! - numbers compare numerically (integers exactly)
//! - strings compare with the collator if one is given, else by code point
//!
//! Null and missing values are never compared; they are placed before or
//! after the present values according to the null order. Lists and nested
//! documents cannot be sorted on.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::document::Document;
use crate::errors::{StoreError, StoreResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Placement of null or missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullOrder {
    /// Nulls first when ascending, last when descending
    #[default]
    Default,
    First,
    Last,
}

/// Locale-aware string comparison
pub trait Collator: fmt::Debug + Send + Sync {
    /// Stable name, used when a sort spec is serialized
    fn name(&self) -> &str;

    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Compares strings ignoring case, falling back to code point order on ties
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitiveCollator;

impl Collator for CaseInsensitiveCollator {
    fn name(&self) -> &str {
        "case_insensitive"
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        let folded = a
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase));
        folded.then_with(|| a.cmp(b))
    }
}

/// Compares embedded digit runs numerically ("disc 2" < "disc 10")
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericCollator;

impl Collator for NumericCollator {
    fn name(&self) -> &str {
        "numeric"
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        let mut left = a.chars().peekable();
        let mut right = b.chars().peekable();

        loop {
            match (left.peek().copied(), right.peek().copied()) {
                (None, None) => return a.cmp(b),
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                    let l_run = take_digits(&mut left);
                    let r_run = take_digits(&mut right);
                    let l_trim = l_run.trim_start_matches('0');
                    let r_trim = r_run.trim_start_matches('0');
                    let ord = l_trim.len().cmp(&r_trim.len()).then_with(|| l_trim.cmp(r_trim));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                (Some(l), Some(r)) => {
                    if l != r {
                        return l.cmp(&r);
                    }
                    left.next();
                    right.next();
                }
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}

/// Looks up a built-in collator by name
pub fn builtin_collator(name: &str) -> Option<Arc<dyn Collator>> {
    match name {
        "case_insensitive" => Some(Arc::new(CaseInsensitiveCollator)),
        "numeric" => Some(Arc::new(NumericCollator)),
        _ => None,
    }
}

/// Sort specification: field, order, null order and optional collator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SortSpecRepr", into = "SortSpecRepr")]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
    pub null_order: NullOrder,
    collator: Option<Arc<dyn Collator>>,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
            null_order: NullOrder::Default,
            collator: None,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Ascending)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Descending)
    }

    pub fn with_null_order(mut self, null_order: NullOrder) -> Self {
        self.null_order = null_order;
        self
    }

    pub fn with_collator(mut self, collator: Arc<dyn Collator>) -> Self {
        self.collator = Some(collator);
        self
    }

    pub fn collator(&self) -> Option<&dyn Collator> {
        self.collator.as_deref()
    }

    /// Returns true if nulls are emitted before present values
    pub fn nulls_first(&self) -> bool {
        match (self.order, self.null_order) {
            (SortOrder::Ascending, NullOrder::Default | NullOrder::First) => true,
            (SortOrder::Ascending, NullOrder::Last) => false,
            (SortOrder::Descending, NullOrder::Default | NullOrder::Last) => false,
            (SortOrder::Descending, NullOrder::First) => true,
        }
    }

    /// Orders `(id, document)` pairs by this spec, returning ids.
    ///
    /// Input order is the discovery order and is kept among equal values and
    /// among nulls.
    pub fn order_ids<'a, I: Copy>(
        &self,
        entries: impl IntoIterator<Item = (I, &'a Document)>,
    ) -> StoreResult<Vec<I>> {
        let mut nulls = Vec::new();
        let mut present: Vec<(I, &'a Value)> = Vec::new();

        for (id, doc) in entries {
            match doc.field(&self.field) {
                None | Some(Value::Null) => nulls.push(id),
                Some(Value::Array(_)) | Some(Value::Object(_)) => {
                    return Err(StoreError::not_comparable(&self.field));
                }
                Some(value) => present.push((id, value)),
            }
        }

        let collator = self.collator();
        // slice::sort_by is stable
        present.sort_by(|(_, a), (_, b)| {
            let ordering = compare_scalars(a, b, collator);
            match self.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        let present = present.into_iter().map(|(id, _)| id);
        let ordered = if self.nulls_first() {
            nulls.into_iter().chain(present).collect()
        } else {
            present.chain(nulls).collect()
        };
        Ok(ordered)
    }
}

impl PartialEq for SortSpec {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
            && self.order == other.order
            && self.null_order == other.null_order
            && self.collator.as_ref().map(|c| c.name().to_string())
                == other.collator.as_ref().map(|c| c.name().to_string())
    }
}

#[derive(Serialize, Deserialize)]
struct SortSpecRepr {
    field: String,
    #[serde(default)]
    order: SortOrder,
    #[serde(default)]
    null_order: NullOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collator: Option<String>,
}

impl TryFrom<SortSpecRepr> for SortSpec {
    type Error = String;

    fn try_from(repr: SortSpecRepr) -> Result<Self, Self::Error> {
        let collator = match repr.collator {
            Some(name) => {
                Some(builtin_collator(&name).ok_or_else(|| format!("unknown collator '{}'", name))?)
            }
            None => None,
        };
        Ok(SortSpec {
            field: repr.field,
            order: repr.order,
            null_order: repr.null_order,
            collator,
        })
    }
}

impl From<SortSpec> for SortSpecRepr {
    fn from(spec: SortSpec) -> Self {
        SortSpecRepr {
            collator: spec.collator.as_ref().map(|c| c.name().to_string()),
            field: spec.field,
            order: spec.order,
            null_order: spec.null_order,
        }
    }
}

/// Compares two present scalar values.
pub fn compare_scalars(a: &Value, b: &Value, collator: Option<&dyn Collator>) -> Ordering {
    let type_order = |v: &Value| -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    };

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => match collator {
            Some(collator) => collator.compare(x, y),
            None => x.cmp(y),
        },
        _ => type_order(a).cmp(&type_order(b)),
    }
}

/// Numeric comparison without losing integer precision. Floats are compared
/// against integers exactly, so the order stays total across i64, u64 and f64.
pub fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (integer_of(a), integer_of(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(x), None) => compare_float_integer(b.as_f64().unwrap_or(0.0), x).reverse(),
        (None, Some(y)) => compare_float_integer(a.as_f64().unwrap_or(0.0), y),
        (None, None) => {
            let x = a.as_f64().unwrap_or(0.0);
            let y = b.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

fn integer_of(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn compare_float_integer(f: f64, i: i128) -> Ordering {
    // 2^127, exactly representable
    const BOUND: f64 = i128::MAX as f64;
    if f >= BOUND {
        return Ordering::Greater;
    }
    if f < -BOUND {
        return Ordering::Less;
    }
    let floor = f.floor();
    match (floor as i128).cmp(&i) {
        Ordering::Equal if f > floor => Ordering::Greater,
        ordering => ordering,
    }
}
