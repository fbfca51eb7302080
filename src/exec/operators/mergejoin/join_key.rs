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
//! Join key extraction and comparison.
//!
//! A join key is the tuple of values of the declared equality columns for one row.
//! Keys from the two sides are compared by value only; column names differ per side.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::common::status::{Status, StatusResult};
use crate::common::types::{ColumnMeta, Datum};
use crate::exec::chunk::Chunk;
use crate::exec::node::join::JoinSide;

#[derive(Clone, Debug)]
pub(crate) struct JoinKey {
    cols: Arc<[ColumnMeta]>,
    values: Vec<Datum>,
}

impl JoinKey {
    pub(crate) fn new(cols: Arc<[ColumnMeta]>, values: Vec<Datum>) -> Self {
        debug_assert_eq!(cols.len(), values.len());
        Self { cols, values }
    }

    pub(crate) fn values(&self) -> &[Datum] {
        &self.values
    }

    /// Lexicographic over the component values; nulls sort lowest.
    pub(crate) fn less(&self, other: &JoinKey) -> bool {
        self.cmp(other) == Ordering::Less
    }
}

impl PartialEq for JoinKey {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for JoinKey {}

impl Ord for JoinKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.values.cmp(&other.values)
    }
}

impl PartialOrd for JoinKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, (col, value)) in self.cols.iter().zip(self.values.iter()).enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", col.name, value)?;
        }
        f.write_str(")")
    }
}

/// The declared join columns of one side, resolved against the first chunk seen.
#[derive(Clone, Debug)]
pub(crate) struct JoinKeyColumns {
    side: JoinSide,
    cols: Arc<[ColumnMeta]>,
}

impl JoinKeyColumns {
    pub(crate) fn resolve(side: JoinSide, names: &[String], chunk: &Chunk) -> StatusResult<Self> {
        let mut cols = Vec::with_capacity(names.len());
        for name in names {
            let idx = chunk
                .index_of(name)
                .ok_or_else(|| missing_column(side, name))?;
            cols.push(chunk.cols()[idx].clone());
        }
        Ok(Self {
            side,
            cols: Arc::from(cols),
        })
    }

    pub(crate) fn cols(&self) -> &Arc<[ColumnMeta]> {
        &self.cols
    }

    /// Positions of the join columns inside `chunk`, which may order its columns
    /// differently from the chunk the columns were resolved on.
    pub(crate) fn indices_in(&self, chunk: &Chunk) -> StatusResult<Vec<usize>> {
        let mut out = Vec::with_capacity(self.cols.len());
        for col in self.cols.iter() {
            let idx = chunk
                .index_of(&col.name)
                .ok_or_else(|| missing_column(self.side, &col.name))?;
            let found = &chunk.cols()[idx];
            if found.ty != col.ty {
                return Err(Status::invalid(format!(
                    "join column '{}' in {} table stream changed type from {} to {}",
                    col.name, self.side, col.ty, found.ty
                )));
            }
            out.push(idx);
        }
        Ok(out)
    }

    pub(crate) fn key_at(
        &self,
        chunk: &Chunk,
        indices: &[usize],
        row: usize,
    ) -> StatusResult<JoinKey> {
        let mut values = Vec::with_capacity(indices.len());
        for &idx in indices {
            values.push(chunk.datum(idx, row)?);
        }
        Ok(JoinKey::new(Arc::clone(&self.cols), values))
    }
}

fn missing_column(side: JoinSide, name: &str) -> Status {
    Status::invalid(format!(
        "cannot set join columns in {} table stream: table is missing column '{}'",
        side, name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::ColumnType;

    fn key(values: Vec<Datum>) -> JoinKey {
        let cols = values
            .iter()
            .enumerate()
            .map(|(i, _)| ColumnMeta::new(format!("c{i}"), ColumnType::Int))
            .collect::<Vec<_>>();
        JoinKey::new(Arc::from(cols), values)
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = key(vec![Datum::from("a"), Datum::Time(4)]);
        let b = key(vec![Datum::from("b"), Datum::Time(1)]);
        assert!(a.less(&b));
        assert!(!b.less(&a));
        assert!(!a.less(&a));
    }

    #[test]
    fn nulls_sort_first_and_match_each_other() {
        let null = key(vec![Datum::Null, Datum::Int(9)]);
        let value = key(vec![Datum::Int(0), Datum::Int(0)]);
        assert!(null.less(&value));
        assert_eq!(null, key(vec![Datum::Null, Datum::Int(9)]));
    }

    #[test]
    fn equality_ignores_column_names() {
        let left = JoinKey::new(
            Arc::from(vec![ColumnMeta::new("label", ColumnType::String)]),
            vec![Datum::from("a")],
        );
        let right = JoinKey::new(
            Arc::from(vec![ColumnMeta::new("id", ColumnType::String)]),
            vec![Datum::from("a")],
        );
        assert_eq!(left, right);
        assert_eq!(left.to_string(), "(label=\"a\")");
    }
}
