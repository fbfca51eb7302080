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
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampNanosecondArray, UInt64Array,
};
use arrow::buffer::Buffer;
use arrow::datatypes::{Field, Schema, SchemaRef};

use crate::common::status::{Status, StatusResult};
use crate::common::types::{ColumnMeta, ColumnType, Datum, GroupKey, Record};
use crate::runtime::mem_tracker::MemTracker;

/// A chunk of rows belonging to one group key.
///
/// Wraps an Arrow `RecordBatch`; every column must map onto one of the primitive
/// `ColumnType`s. Cloning and slicing never copy column buffers.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub batch: RecordBatch,
    key: GroupKey,
    cols: Arc<[ColumnMeta]>,
    accounting: Option<Arc<ChunkAccounting>>,
}

impl Chunk {
    pub fn try_new(batch: RecordBatch, key: GroupKey) -> StatusResult<Self> {
        let cols = cols_from_schema(batch.schema().as_ref())?;
        for key_col in key.cols() {
            if !cols.iter().any(|c| c == key_col) {
                return Err(Status::invalid(format!(
                    "group key column '{}' missing from chunk schema",
                    key_col
                )));
            }
        }
        Ok(Self {
            batch,
            key,
            cols: Arc::from(cols),
            accounting: None,
        })
    }

    /// Zero-row chunk with the given columns.
    pub fn new_empty(cols: &[ColumnMeta], key: GroupKey) -> StatusResult<Self> {
        let schema = schema_from_cols(cols);
        Self::try_new(RecordBatch::new_empty(schema), key)
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn cols(&self) -> &[ColumnMeta] {
        &self.cols
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.cols.iter().position(|c| c.name == name)
    }

    pub fn column(&self, idx: usize) -> &ArrayRef {
        self.batch.column(idx)
    }

    pub fn num_columns(&self) -> usize {
        self.cols.len()
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Zero-copy view of `length` rows starting at `offset`.
    ///
    /// The slice shares the parent's accounting handle, so the bytes are released
    /// once the last view of the buffers is dropped.
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        Self {
            batch: self.batch.slice(offset, length),
            key: self.key.clone(),
            cols: Arc::clone(&self.cols),
            accounting: self.accounting.clone(),
        }
    }

    pub fn datum(&self, col_idx: usize, row: usize) -> StatusResult<Datum> {
        let col = self.cols.get(col_idx).ok_or_else(|| {
            Status::internal(format!(
                "column index {} out of range (num_columns={})",
                col_idx,
                self.cols.len()
            ))
        })?;
        datum_at(self.batch.column(col_idx), col.ty, row)
    }

    /// Materialize one row shaped like `shape`: columns the chunk lacks come back as null.
    pub fn record(&self, row: usize, shape: &[ColumnMeta]) -> StatusResult<Record> {
        let mut record = Record::new();
        for col in shape {
            let value = match self.index_of(&col.name) {
                Some(idx) => self.datum(idx, row)?,
                None => Datum::Null,
            };
            record.set(col.name.clone(), value);
        }
        Ok(record)
    }

    pub fn estimated_bytes(&self) -> usize {
        self.batch.get_array_memory_size()
    }

    pub fn logical_bytes(&self) -> usize {
        record_batch_bytes(&self.batch)
    }

    pub fn is_accounted(&self) -> bool {
        self.accounting.is_some()
    }

    /// Charge this chunk to `tracker` without a limit check, or move an existing
    /// charge there.
    pub fn transfer_to(&mut self, tracker: &Arc<MemTracker>) {
        if let Some(accounting) = self.accounting.as_ref() {
            accounting.transfer_to(tracker);
            return;
        }
        let bytes = chunk_bytes_i64(&self.batch);
        if bytes <= 0 {
            return;
        }
        tracker.consume(bytes);
        self.accounting = Some(Arc::new(ChunkAccounting::new(bytes, tracker)));
    }

    /// Charge a freshly built chunk to `tracker`, failing if a limit would be exceeded.
    pub fn try_account(&mut self, tracker: &Arc<MemTracker>) -> StatusResult<()> {
        if self.accounting.is_some() {
            return Ok(());
        }
        let bytes = chunk_bytes_i64(&self.batch);
        if bytes <= 0 {
            return Ok(());
        }
        tracker.try_consume(bytes)?;
        self.accounting = Some(Arc::new(ChunkAccounting::new(bytes, tracker)));
        Ok(())
    }
}

pub fn schema_from_cols(cols: &[ColumnMeta]) -> SchemaRef {
    let fields = cols
        .iter()
        .map(|c| Field::new(c.name.clone(), c.ty.to_arrow(), true))
        .collect::<Vec<_>>();
    Arc::new(Schema::new(fields))
}

fn cols_from_schema(schema: &Schema) -> StatusResult<Vec<ColumnMeta>> {
    let mut seen = HashSet::new();
    let mut cols = Vec::with_capacity(schema.fields().len());
    for (idx, f) in schema.fields().iter().enumerate() {
        let ty = ColumnType::from_arrow(f.data_type()).ok_or_else(|| {
            Status::invalid(format!(
                "unsupported column type {} in chunk schema field at index {} (name={})",
                f.data_type(),
                idx,
                f.name()
            ))
        })?;
        if !seen.insert(f.name().as_str()) {
            return Err(Status::invalid(format!(
                "duplicate column '{}' in chunk schema",
                f.name()
            )));
        }
        cols.push(ColumnMeta::new(f.name().clone(), ty));
    }
    Ok(cols)
}

macro_rules! downcast_value {
    ($array:expr, $ty:ty, $row:expr, $wrap:expr) => {{
        let typed = $array.as_any().downcast_ref::<$ty>().ok_or_else(|| {
            Status::internal(format!(
                "column array type {} does not match {}",
                $array.data_type(),
                stringify!($ty)
            ))
        })?;
        $wrap(typed.value($row))
    }};
}

/// Read one cell of a primitive column.
pub fn datum_at(array: &ArrayRef, ty: ColumnType, row: usize) -> StatusResult<Datum> {
    if row >= array.len() {
        return Err(Status::internal(format!(
            "row {} out of range (len={})",
            row,
            array.len()
        )));
    }
    if array.is_null(row) {
        return Ok(Datum::Null);
    }
    let value = match ty {
        ColumnType::Bool => downcast_value!(array, BooleanArray, row, Datum::Bool),
        ColumnType::Int => downcast_value!(array, Int64Array, row, Datum::Int),
        ColumnType::UInt => downcast_value!(array, UInt64Array, row, Datum::UInt),
        ColumnType::Float => downcast_value!(array, Float64Array, row, Datum::Float),
        ColumnType::String => downcast_value!(array, StringArray, row, |v: &str| Datum::string(v)),
        ColumnType::Time => downcast_value!(array, TimestampNanosecondArray, row, Datum::Time),
    };
    Ok(value)
}

/// Estimate RecordBatch size by summing unique buffers inside the batch.
///
/// Buffers are de-duplicated only within a single RecordBatch; shared buffers
/// across batches are double-counted, which is why slices share their parent's
/// accounting instead of charging again.
pub fn record_batch_bytes(batch: &RecordBatch) -> usize {
    let mut seen = HashSet::new();
    let mut total = 0usize;
    for column in batch.columns() {
        total = total.saturating_add(array_data_bytes(&column.to_data(), &mut seen));
    }
    total
}

fn array_data_bytes(data: &arrow::array::ArrayData, seen: &mut HashSet<usize>) -> usize {
    let mut total = 0usize;
    for buffer in data.buffers() {
        total = total.saturating_add(buffer_bytes(buffer, seen));
    }
    if let Some(nulls) = data.nulls() {
        total = total.saturating_add(buffer_bytes(nulls.buffer(), seen));
    }
    for child in data.child_data() {
        total = total.saturating_add(array_data_bytes(child, seen));
    }
    total
}

fn buffer_bytes(buffer: &Buffer, seen: &mut HashSet<usize>) -> usize {
    let ptr = buffer.data_ptr().as_ptr() as usize;
    if !seen.insert(ptr) {
        return 0;
    }
    buffer.capacity().max(buffer.len())
}

impl Default for Chunk {
    fn default() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
            key: GroupKey::empty(),
            cols: Arc::from(Vec::new()),
            accounting: None,
        }
    }
}

#[derive(Debug)]
struct ChunkAccounting {
    bytes: i64,
    tracker: Mutex<Arc<MemTracker>>,
}

impl ChunkAccounting {
    /// Wrap bytes the caller has already charged to `tracker`.
    fn new(bytes: i64, tracker: &Arc<MemTracker>) -> Self {
        Self {
            bytes,
            tracker: Mutex::new(Arc::clone(tracker)),
        }
    }

    fn transfer_to(&self, tracker: &Arc<MemTracker>) {
        let mut guard = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        if Arc::ptr_eq(&guard, tracker) {
            return;
        }
        guard.release(self.bytes);
        tracker.consume(self.bytes);
        *guard = Arc::clone(tracker);
    }
}

impl Drop for ChunkAccounting {
    fn drop(&mut self) {
        let guard = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        guard.release(self.bytes);
    }
}

fn chunk_bytes_i64(batch: &RecordBatch) -> i64 {
    i64::try_from(record_batch_bytes(batch)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field};

    fn group_key() -> GroupKey {
        GroupKey::try_new(vec![(ColumnMeta::new("g", ColumnType::String), Datum::from("x"))])
            .expect("group key")
    }

    fn sample_chunk() -> Chunk {
        let schema = Arc::new(Schema::new(vec![
            Field::new("g", DataType::Utf8, true),
            Field::new("v", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["x", "x", "x"])),
                Arc::new(Int64Array::from(vec![Some(1), None, Some(3)])),
            ],
        )
        .expect("record batch");
        Chunk::try_new(batch, group_key()).expect("chunk")
    }

    #[test]
    fn rejects_unsupported_column_types() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2]))])
            .expect("record batch");
        let err = Chunk::try_new(batch, GroupKey::empty()).expect_err("expected type error");
        assert!(err.message().contains("unsupported column type"), "err={}", err);
    }

    #[test]
    fn rejects_missing_group_key_column() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1]))])
            .expect("record batch");
        let err = Chunk::try_new(batch, group_key()).expect_err("expected key error");
        assert!(err.message().contains("'g:string'"), "err={}", err);
    }

    #[test]
    fn record_fills_absent_columns_with_null() {
        let chunk = sample_chunk();
        let shape = vec![
            ColumnMeta::new("v", ColumnType::Int),
            ColumnMeta::new("w", ColumnType::Float),
        ];
        let row = chunk.record(1, &shape).expect("record");
        assert_eq!(row.get("v"), Some(&Datum::Null));
        assert_eq!(row.get("w"), Some(&Datum::Null));
        let row = chunk.record(2, &shape).expect("record");
        assert_eq!(row.get("v"), Some(&Datum::Int(3)));
    }

    #[test]
    fn slices_share_accounting() {
        let tracker = MemTracker::new_root("chunk");
        let mut chunk = sample_chunk();
        chunk.try_account(&tracker).expect("account");
        let charged = tracker.current();
        assert!(charged > 0);

        let head = chunk.slice(0, 1);
        let tail = chunk.slice(1, 2);
        assert_eq!(tracker.current(), charged);
        assert_eq!(tail.datum(1, 1).expect("datum"), Datum::Int(3));

        drop(chunk);
        drop(head);
        assert_eq!(tracker.current(), charged);
        drop(tail);
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn try_account_honours_limit() {
        let tracker = MemTracker::new_root_with_limit("tiny", Some(1));
        let mut chunk = sample_chunk();
        let err = chunk.try_account(&tracker).expect_err("limit");
        assert_eq!(err.code(), crate::common::status::StatusCode::ResourceExhausted);
        assert!(!chunk.is_accounted());
        assert_eq!(tracker.current(), 0);
    }
}
