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
//! Per-side, per-group-key scanner that cuts a chunk stream into join-key runs.
//!
//! Responsibilities:
//! - Walks each chunk from the last unresolved boundary and returns one complete
//!   `(key, rows)` run per call.
//! - Buffers a run that reaches the end of a chunk until a later chunk or `flush`
//!   resolves it.
//! - Tracks the union of column schemas observed on this side.
//!
//! Key exported interfaces:
//! - Types: `SideBuffer`.

use crate::common::status::{Status, StatusResult};
use crate::common::types::{ColumnMeta, schema_union};
use crate::exec::chunk::Chunk;
use crate::exec::node::join::JoinSide;

use super::join_key::{JoinKey, JoinKeyColumns};
use super::join_product::JoinRows;

#[derive(Debug)]
pub(crate) struct SideBuffer {
    side: JoinSide,
    join_columns: Vec<String>,
    key_cols: Option<JoinKeyColumns>,
    schema: Vec<ColumnMeta>,
    current_key: Option<JoinKey>,
    pending: JoinRows,
    cursor: usize,
    done: bool,
}

impl SideBuffer {
    pub(crate) fn new(side: JoinSide, join_columns: Vec<String>) -> Self {
        Self {
            side,
            join_columns,
            key_cols: None,
            schema: Vec::new(),
            current_key: None,
            pending: JoinRows::new(),
            cursor: 0,
            done: false,
        }
    }

    pub(crate) fn schema(&self) -> &[ColumnMeta] {
        &self.schema
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    pub(crate) fn mark_done(&mut self) {
        self.done = true;
    }

    #[cfg(test)]
    pub(crate) fn buffered_rows(&self) -> usize {
        self.pending.num_rows()
    }

    /// Record the chunk's columns and resolve the join columns on first use.
    pub(crate) fn observe(&mut self, chunk: &Chunk) -> StatusResult<()> {
        if self.key_cols.is_none() {
            self.key_cols = Some(JoinKeyColumns::resolve(
                self.side,
                &self.join_columns,
                chunk,
            )?);
        }
        schema_union(&mut self.schema, chunk.cols());
        Ok(())
    }

    /// Return the next complete run in `chunk`, or `None` once the rest of the
    /// chunk has been buffered. Call repeatedly with the same chunk until `None`.
    pub(crate) fn scan(&mut self, chunk: &Chunk) -> StatusResult<Option<(JoinKey, JoinRows)>> {
        let Some(key_cols) = self.key_cols.as_ref() else {
            return Err(Status::internal(format!(
                "{} side buffer scanned before observing a chunk",
                self.side
            )));
        };
        let start = self.cursor;
        if start >= chunk.len() {
            self.cursor = 0;
            return Ok(None);
        }
        let indices = key_cols.indices_in(chunk)?;
        let run_key = match self.current_key.take() {
            Some(key) => key,
            None => key_cols.key_at(chunk, &indices, start)?,
        };

        let mut end = start;
        while end < chunk.len() {
            let key = key_cols.key_at(chunk, &indices, end)?;
            if key != run_key {
                if key.less(&run_key) {
                    return Err(Status::internal(format!(
                        "{} table stream is not sorted on the join columns: key {} follows {}",
                        self.side, key, run_key
                    )));
                }
                break;
            }
            end += 1;
        }

        if end < chunk.len() {
            let mut rows = std::mem::take(&mut self.pending);
            rows.push(chunk.slice(start, end - start));
            self.cursor = end;
            return Ok(Some((run_key, rows)));
        }

        self.pending.push(chunk.slice(start, end - start));
        self.current_key = Some(run_key);
        self.cursor = 0;
        Ok(None)
    }

    /// Hand out whatever run is still buffered.
    pub(crate) fn flush(&mut self) -> Option<(JoinKey, JoinRows)> {
        self.cursor = 0;
        let key = self.current_key.take()?;
        let rows = std::mem::take(&mut self.pending);
        if rows.is_empty() {
            return None;
        }
        Some((key, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{ColumnType, Datum, GroupKey};
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn chunk(labels: &[&str], values: &[i64]) -> Chunk {
        let schema = crate::exec::chunk::schema_from_cols(&[
            ColumnMeta::new("label", ColumnType::String),
            ColumnMeta::new("v", ColumnType::Int),
        ]);
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(labels.to_vec())) as ArrayRef,
                Arc::new(Int64Array::from(values.to_vec())) as ArrayRef,
            ],
        )
        .expect("record batch");
        Chunk::try_new(batch, GroupKey::empty()).expect("chunk")
    }

    fn buffer() -> SideBuffer {
        SideBuffer::new(JoinSide::Left, vec!["label".to_string()])
    }

    fn drain(buf: &mut SideBuffer, chunk: &Chunk) -> Vec<(String, usize)> {
        buf.observe(chunk).expect("observe");
        let mut out = Vec::new();
        while let Some((key, rows)) = buf.scan(chunk).expect("scan") {
            out.push((key.to_string(), rows.num_rows()));
        }
        out
    }

    #[test]
    fn emits_runs_and_buffers_the_tail() {
        let mut buf = buffer();
        let c = chunk(&["a", "a", "b", "c", "c"], &[1, 2, 3, 4, 5]);
        assert_eq!(
            drain(&mut buf, &c),
            vec![("(label=\"a\")".to_string(), 2), ("(label=\"b\")".to_string(), 1)]
        );
        assert_eq!(buf.buffered_rows(), 2);
        let (key, rows) = buf.flush().expect("tail");
        assert_eq!(key.values(), &[Datum::from("c")]);
        assert_eq!(rows.num_rows(), 2);
        assert!(buf.flush().is_none());
    }

    #[test]
    fn run_spanning_chunks_is_joined_up() {
        let mut buf = buffer();
        assert!(drain(&mut buf, &chunk(&["a"], &[1])).is_empty());
        assert!(drain(&mut buf, &chunk(&["a", "a"], &[2, 3])).is_empty());
        let out = drain(&mut buf, &chunk(&["a", "b"], &[4, 5]));
        assert_eq!(out, vec![("(label=\"a\")".to_string(), 4)]);
        let (_, rows) = buf.flush().expect("tail");
        assert_eq!(rows.num_rows(), 1);
    }

    #[test]
    fn key_change_at_chunk_start_closes_previous_run() {
        let mut buf = buffer();
        drain(&mut buf, &chunk(&["a", "a"], &[1, 2]));
        let out = drain(&mut buf, &chunk(&["b"], &[3]));
        assert_eq!(out, vec![("(label=\"a\")".to_string(), 2)]);
    }

    #[test]
    fn missing_join_column_is_reported() {
        let mut buf = SideBuffer::new(JoinSide::Left, vec!["host".to_string()]);
        let err = buf
            .observe(&chunk(&["a"], &[1]))
            .expect_err("missing column");
        assert_eq!(
            err.message(),
            "cannot set join columns in left table stream: table is missing column 'host'"
        );
    }

    #[test]
    fn descending_keys_are_rejected() {
        let mut buf = buffer();
        let c = chunk(&["b", "a"], &[1, 2]);
        buf.observe(&c).expect("observe");
        let err = buf.scan(&c).expect_err("unsorted");
        assert!(err.message().contains("not sorted"));
    }
}
