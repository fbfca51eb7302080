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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampNanosecondArray,
    UInt64Array,
};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use tempfile::TempDir;

use flowjoin::{
    Chunk, CollectSink, ColumnMeta, ColumnPair, ColumnType, Datum, GroupKey, InputMessage,
    JoinSide, MemTracker, MergeJoinNode, MergeJoinOptions, MergeJoinTransformation,
    MessageOperator, RowEvaluator, StatusResult, flowjoin_config, flowjoin_logging,
};

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_content(
            r#"
log_level = "debug"

[runtime]
chunk_buffer_rows = 1024
mem_limit_bytes = 0
message_queue_capacity = 8

[debug]
log_join_products = true
"#,
        )
    }

    pub fn with_content(content: &str) -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_flowjoin.toml");
        std::fs::write(&config_path, content)?;
        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    pub fn init_logging(&self) {
        flowjoin_logging::init_with_level("debug");
    }

    pub fn load_config(&self) -> anyhow::Result<&'static flowjoin_config::FlowJoinConfig> {
        flowjoin_config::init_from_path(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

/// Group key with string-valued columns.
pub fn group_key(pairs: &[(&str, &str)]) -> GroupKey {
    GroupKey::try_new(
        pairs
            .iter()
            .map(|(name, value)| (ColumnMeta::new(*name, ColumnType::String), Datum::from(*value)))
            .collect(),
    )
    .expect("group key")
}

/// Builds chunks for one group key; key columns are filled in automatically.
#[derive(Clone)]
pub struct TableBuilder {
    key: GroupKey,
    cols: Vec<ColumnMeta>,
    rows: Vec<Vec<Datum>>,
}

impl TableBuilder {
    pub fn new(key: GroupKey) -> Self {
        Self {
            key,
            cols: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, ty: ColumnType) -> Self {
        self.cols.push(ColumnMeta::new(name, ty));
        self
    }

    pub fn row(mut self, values: Vec<Datum>) -> Self {
        assert_eq!(values.len(), self.cols.len(), "row width");
        self.rows.push(values);
        self
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn build(&self) -> Chunk {
        self.build_range(0, self.rows.len())
    }

    /// Cut the rows into chunks of `size` rows.
    pub fn build_split(&self, size: usize) -> Vec<Chunk> {
        let mut out = Vec::new();
        let mut start = 0;
        while start < self.rows.len() {
            let end = (start + size).min(self.rows.len());
            out.push(self.build_range(start, end));
            start = end;
        }
        out
    }

    fn build_range(&self, start: usize, end: usize) -> Chunk {
        let mut fields = Vec::new();
        let mut columns = Vec::new();
        let n = end - start;
        for (col, value) in self.key.iter() {
            fields.push(Field::new(col.name.clone(), col.ty.to_arrow(), true));
            columns.push(array(col.ty, vec![value; n]));
        }
        for (idx, col) in self.cols.iter().enumerate() {
            fields.push(Field::new(col.name.clone(), col.ty.to_arrow(), true));
            columns.push(array(
                col.ty,
                self.rows[start..end].iter().map(|r| &r[idx]).collect(),
            ));
        }
        let batch =
            RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).expect("record batch");
        Chunk::try_new(batch, self.key.clone()).expect("chunk")
    }
}

fn array(ty: ColumnType, values: Vec<&Datum>) -> ArrayRef {
    match ty {
        ColumnType::Bool => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Datum::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnType::Int => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Datum::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnType::UInt => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Datum::UInt(i) => Some(*i),
                    _ => None,
                })
                .collect::<UInt64Array>(),
        ),
        ColumnType::Float => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Datum::Float(f) => Some(*f),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::String => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Datum::String(s) => Some(s.to_string()),
                    _ => None,
                })
                .collect::<StringArray>(),
        ),
        ColumnType::Time => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Datum::Time(t) => Some(*t),
                    _ => None,
                })
                .collect::<TimestampNanosecondArray>(),
        ),
    }
}

/// Chunk messages for one group key followed by its flush.
pub fn key_stream(side: JoinSide, key: &GroupKey, chunks: Vec<Chunk>) -> Vec<InputMessage> {
    let mut out = chunks
        .into_iter()
        .map(|c| InputMessage::chunk(side, c))
        .collect::<Vec<_>>();
    out.push(InputMessage::flush_key(side, key.clone()));
    out
}

pub fn node(on: &[(&str, &str)], method: &str) -> MergeJoinNode {
    MergeJoinNode::try_new(
        1,
        on.iter().map(|(l, r)| ColumnPair::new(*l, *r)).collect(),
        method,
    )
    .expect("merge join node")
}

pub fn test_options() -> MergeJoinOptions {
    MergeJoinOptions {
        chunk_buffer_rows: 1024,
        mem_tracker: Some(MemTracker::new_root("merge_join_it")),
        log_join_products: false,
    }
}

/// Feed `messages` in order into a fresh transformation; stops at the first error.
pub fn run_messages(
    node: MergeJoinNode,
    f: Arc<dyn RowEvaluator>,
    messages: Vec<InputMessage>,
    options: MergeJoinOptions,
) -> (CollectSink, StatusResult<()>) {
    let sink = CollectSink::new();
    let mut op = MergeJoinTransformation::new(node, f, Box::new(sink.clone()), options);
    for message in messages {
        if let Err(err) = op.process_message(message) {
            return (sink, Err(err));
        }
    }
    (sink, Ok(()))
}

/// Values of `cols` for every output row, sorted.
pub fn rows_of(chunks: &[Chunk], cols: &[&str]) -> Vec<Vec<Datum>> {
    let mut out = Vec::new();
    for chunk in chunks {
        let idx = cols
            .iter()
            .map(|c| chunk.index_of(c).unwrap_or_else(|| panic!("missing column {c}")))
            .collect::<Vec<_>>();
        for row in 0..chunk.len() {
            out.push(
                idx.iter()
                    .map(|i| chunk.datum(*i, row).expect("datum"))
                    .collect(),
            );
        }
    }
    out.sort();
    out
}

/// Run `f` and fail the test if it does not finish within `timeout`.
pub fn run_with_timeout<F, T>(timeout: Duration, f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    use std::sync::mpsc;

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });

    match rx.recv_timeout(timeout) {
        Ok(v) => v,
        Err(_) => panic!("test timed out after {:?}", timeout),
    }
}
