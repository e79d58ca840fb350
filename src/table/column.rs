//! Typed columns and the cell values read from them.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A single non-missing cell.
///
/// Totally ordered and hashable, so it can key top-K maps and be hashed into sketches.
/// Values of different kinds order by kind first (`Integer < Double < String`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Double(OrderedFloat<f64>),
    String(String),
}

impl Value {
    /// Numeric view of the value; strings have none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(d.into_inner()),
            Self::String(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(OrderedFloat(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    Double,
    String,
}

#[derive(Clone, Debug)]
enum ColumnData {
    Integer(Vec<i64>),
    Double(Vec<f64>),
    String(Vec<String>),
}

/// Named, typed vector of cells with an optional missing mask.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    data: ColumnData,
    missing: Option<Vec<bool>>,
}

fn split_missing<T: Default>(values: Vec<Option<T>>) -> (Vec<T>, Option<Vec<bool>>) {
    let mut mask = Vec::with_capacity(values.len());
    let mut data = Vec::with_capacity(values.len());
    for v in values {
        mask.push(v.is_none());
        data.push(v.unwrap_or_default());
    }
    let any_missing = mask.iter().any(|&m| m);
    (data, any_missing.then_some(mask))
}

impl Column {
    #[must_use]
    pub fn doubles(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Double(values),
            missing: None,
        }
    }

    #[must_use]
    pub fn integers(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Integer(values),
            missing: None,
        }
    }

    #[must_use]
    pub fn strings<I, T>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            data: ColumnData::String(values.into_iter().map(Into::into).collect()),
            missing: None,
        }
    }

    /// Double column where `None` marks a missing cell.
    #[must_use]
    pub fn nullable_doubles(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let (data, missing) = split_missing(values);
        Self {
            name: name.into(),
            data: ColumnData::Double(data),
            missing,
        }
    }

    #[must_use]
    pub fn nullable_integers(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        let (data, missing) = split_missing(values);
        Self {
            name: name.into(),
            data: ColumnData::Integer(data),
            missing,
        }
    }

    #[must_use]
    pub fn nullable_strings(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        let (data, missing) = split_missing(values);
        Self {
            name: name.into(),
            data: ColumnData::String(data),
            missing,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Integer(_) => ColumnKind::Integer,
            ColumnData::Double(_) => ColumnKind::Double,
            ColumnData::String(_) => ColumnKind::String,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.kind() != ColumnKind::String
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Integer(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for a missing cell. Rows past the end count as missing.
    #[must_use]
    pub fn is_missing(&self, row: usize) -> bool {
        if row >= self.len() {
            return true;
        }
        self.missing.as_ref().is_some_and(|m| m[row])
    }

    /// The cell at `row`, or `None` when it is missing.
    #[must_use]
    pub fn value(&self, row: usize) -> Option<Value> {
        if self.is_missing(row) {
            return None;
        }
        Some(match &self.data {
            ColumnData::Integer(v) => Value::Integer(v[row]),
            ColumnData::Double(v) => Value::from(v[row]),
            ColumnData::String(v) => Value::String(v[row].clone()),
        })
    }

    /// Numeric cell without allocating; `None` when missing or not numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_double(&self, row: usize) -> Option<f64> {
        if self.is_missing(row) {
            return None;
        }
        match &self.data {
            ColumnData::Integer(v) => Some(v[row] as f64),
            ColumnData::Double(v) => Some(v[row]),
            ColumnData::String(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self, row: usize) -> Option<&str> {
        if self.is_missing(row) {
            return None;
        }
        match &self.data {
            ColumnData::String(v) => Some(&v[row]),
            _ => None,
        }
    }
}
