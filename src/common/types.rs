// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Scalar and schema types shared by the join engine.
//!
//! Responsibilities:
//! - Maps the six primitive column types onto their Arrow physical types.
//! - Defines `Datum` (one cell value), `GroupKey` (the per-table identity of a chunk)
//!   and `Record` (one row as seen by a row function).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arrow::datatypes::{DataType, TimeUnit};

use crate::common::status::{Status, StatusResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ColumnType {
    Bool,
    Int,
    UInt,
    Float,
    String,
    Time,
}

impl ColumnType {
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Bool => DataType::Boolean,
            ColumnType::Int => DataType::Int64,
            ColumnType::UInt => DataType::UInt64,
            ColumnType::Float => DataType::Float64,
            ColumnType::String => DataType::Utf8,
            ColumnType::Time => DataType::Timestamp(TimeUnit::Nanosecond, None),
        }
    }

    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Boolean => Some(ColumnType::Bool),
            DataType::Int64 => Some(ColumnType::Int),
            DataType::UInt64 => Some(ColumnType::UInt),
            DataType::Float64 => Some(ColumnType::Float),
            DataType::Utf8 => Some(ColumnType::String),
            DataType::Timestamp(TimeUnit::Nanosecond, None) => Some(ColumnType::Time),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Bool => "bool",
            ColumnType::Int => "int",
            ColumnType::UInt => "uint",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Time => "time",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column descriptor: a name plus its primitive type.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ColumnMeta {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for ColumnMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.ty)
    }
}

/// Append the columns of `other` that `schema` has not seen yet.
pub fn schema_union(schema: &mut Vec<ColumnMeta>, other: &[ColumnMeta]) {
    for col in other {
        if !schema.contains(col) {
            schema.push(col.clone());
        }
    }
}

/// One cell value.
///
/// `Time` is nanoseconds since the unix epoch. `List` only appears in row function
/// output and has no column representation.
#[derive(Clone, Debug)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(Arc<str>),
    Time(i64),
    List(Vec<Datum>),
}

impl Datum {
    pub fn string(value: impl AsRef<str>) -> Self {
        Datum::String(Arc::from(value.as_ref()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Column type able to hold this value; `None` for nulls and lists.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Datum::Null | Datum::List(_) => None,
            Datum::Bool(_) => Some(ColumnType::Bool),
            Datum::Int(_) => Some(ColumnType::Int),
            Datum::UInt(_) => Some(ColumnType::UInt),
            Datum::Float(_) => Some(ColumnType::Float),
            Datum::String(_) => Some(ColumnType::String),
            Datum::Time(_) => Some(ColumnType::Time),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::List(_) => "array",
            other => other.column_type().map(ColumnType::as_str).unwrap_or("invalid"),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Datum::Null => 0,
            Datum::Bool(_) => 1,
            Datum::Int(_) => 2,
            Datum::UInt(_) => 3,
            Datum::Float(_) => 4,
            Datum::String(_) => 5,
            Datum::Time(_) => 6,
            Datum::List(_) => 7,
        }
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
            (Datum::UInt(a), Datum::UInt(b)) => a.cmp(b),
            (Datum::Float(a), Datum::Float(b)) => a.total_cmp(b),
            (Datum::String(a), Datum::String(b)) => a.cmp(b),
            (Datum::Time(a), Datum::Time(b)) => a.cmp(b),
            (Datum::List(a), Datum::List(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Datum::Null => {}
            Datum::Bool(v) => v.hash(state),
            Datum::Int(v) | Datum::Time(v) => v.hash(state),
            Datum::UInt(v) => v.hash(state),
            Datum::Float(v) => v.to_bits().hash(state),
            Datum::String(v) => v.hash(state),
            Datum::List(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("null"),
            Datum::Bool(v) => write!(f, "{v}"),
            Datum::Int(v) => write!(f, "{v}"),
            Datum::UInt(v) => write!(f, "{v}"),
            Datum::Float(v) => write!(f, "{v}"),
            Datum::String(v) => write!(f, "{v:?}"),
            Datum::Time(v) => write!(f, "{v}ns"),
            Datum::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Bool(v)
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<u64> for Datum {
    fn from(v: u64) -> Self {
        Datum::UInt(v)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Float(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::string(v)
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Datum::String(Arc::from(v))
    }
}

/// Identity of one logical table inside a stream.
///
/// Columns are kept sorted by name so two keys built from the same pairs in a
/// different order compare and hash equal. Cloning is a refcount bump.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct GroupKey {
    entries: Arc<[(ColumnMeta, Datum)]>,
}

impl GroupKey {
    pub fn try_new(mut entries: Vec<(ColumnMeta, Datum)>) -> StatusResult<Self> {
        entries.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        for pair in entries.windows(2) {
            if pair[0].0.name == pair[1].0.name {
                return Err(Status::invalid(format!(
                    "duplicate group key column '{}'",
                    pair[0].0.name
                )));
            }
        }
        for (col, value) in &entries {
            if let Some(ty) = value.column_type()
                && ty != col.ty
            {
                return Err(Status::invalid(format!(
                    "group key column '{}' holds a {} value",
                    col,
                    value.kind_name()
                )));
            }
            if matches!(value, Datum::List(_)) {
                return Err(Status::invalid(format!(
                    "group key column '{}' cannot hold an array",
                    col
                )));
            }
        }
        Ok(Self {
            entries: Arc::from(entries),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cols(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.entries.iter().map(|(col, _)| col)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnMeta, &Datum)> {
        self.entries.iter().map(|(col, value)| (col, value))
    }

    pub fn value(&self, name: &str) -> Option<&Datum> {
        self.entries
            .binary_search_by(|(col, _)| col.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.entries[idx].1)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (col, value)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", col.name, value)?;
        }
        f.write_str("}")
    }
}

/// One row, keyed by column name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Datum>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Datum>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Datum>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Datum)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, Datum)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
