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
//! Builds output chunks from row-function records.
//!
//! Responsibilities:
//! - Appends `Record`s column by column into typed Arrow builders.
//! - Seals the rows appended so far into one `Chunk` per builder.
//!
//! Key exported interfaces:
//! - Types: `OutputBuilder`.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampNanosecondBuilder, UInt64Builder,
};
use arrow::record_batch::RecordBatch;

use crate::common::status::{Status, StatusResult};
use crate::common::types::{ColumnMeta, ColumnType, Datum, GroupKey, Record};
use crate::exec::chunk::{Chunk, schema_from_cols};

enum ColumnBuilder {
    Bool(BooleanBuilder),
    Int(Int64Builder),
    UInt(UInt64Builder),
    Float(Float64Builder),
    String(StringBuilder),
    Time(TimestampNanosecondBuilder),
}

impl ColumnBuilder {
    fn new(ty: ColumnType, capacity: usize) -> Self {
        match ty {
            ColumnType::Bool => Self::Bool(BooleanBuilder::with_capacity(capacity)),
            ColumnType::Int => Self::Int(Int64Builder::with_capacity(capacity)),
            ColumnType::UInt => Self::UInt(UInt64Builder::with_capacity(capacity)),
            ColumnType::Float => Self::Float(Float64Builder::with_capacity(capacity)),
            ColumnType::String => Self::String(StringBuilder::with_capacity(capacity, capacity * 8)),
            ColumnType::Time => Self::Time(TimestampNanosecondBuilder::with_capacity(capacity)),
        }
    }

    /// Append `value`; returns false when its kind does not fit the column.
    fn append(&mut self, value: &Datum) -> bool {
        match (self, value) {
            (Self::Bool(b), Datum::Null) => b.append_null(),
            (Self::Int(b), Datum::Null) => b.append_null(),
            (Self::UInt(b), Datum::Null) => b.append_null(),
            (Self::Float(b), Datum::Null) => b.append_null(),
            (Self::String(b), Datum::Null) => b.append_null(),
            (Self::Time(b), Datum::Null) => b.append_null(),
            (Self::Bool(b), Datum::Bool(v)) => b.append_value(*v),
            (Self::Int(b), Datum::Int(v)) => b.append_value(*v),
            (Self::UInt(b), Datum::UInt(v)) => b.append_value(*v),
            (Self::Float(b), Datum::Float(v)) => b.append_value(*v),
            (Self::String(b), Datum::String(v)) => b.append_value(v.as_ref()),
            (Self::Time(b), Datum::Time(v)) => b.append_value(*v),
            _ => return false,
        }
        true
    }

    fn finish(self) -> ArrayRef {
        match self {
            Self::Bool(mut b) => Arc::new(b.finish()),
            Self::Int(mut b) => Arc::new(b.finish()),
            Self::UInt(mut b) => Arc::new(b.finish()),
            Self::Float(mut b) => Arc::new(b.finish()),
            Self::String(mut b) => Arc::new(b.finish()),
            Self::Time(mut b) => Arc::new(b.finish()),
        }
    }
}

/// Row-wise builder for one output chunk with a fixed column layout.
pub(crate) struct OutputBuilder {
    cols: Vec<ColumnMeta>,
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

impl OutputBuilder {
    pub(crate) fn new(cols: Vec<ColumnMeta>, capacity: usize) -> Self {
        let builders = cols
            .iter()
            .map(|c| ColumnBuilder::new(c.ty, capacity))
            .collect();
        Self {
            cols,
            builders,
            rows: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.rows
    }

    /// Properties outside the layout are dropped; missing ones become null.
    pub(crate) fn append_record(&mut self, record: &Record) -> StatusResult<()> {
        for (col, builder) in self.cols.iter().zip(self.builders.iter_mut()) {
            let value = record.get(&col.name).unwrap_or(&Datum::Null);
            if !builder.append(value) {
                return Err(Status::invalid(format!(
                    "output column '{}' has type {} but the row function produced a {} value",
                    col.name,
                    col.ty,
                    value.kind_name()
                )));
            }
        }
        self.rows += 1;
        Ok(())
    }

    pub(crate) fn finish(self, key: GroupKey) -> StatusResult<Chunk> {
        let schema = schema_from_cols(&self.cols);
        let columns = self
            .builders
            .into_iter()
            .map(ColumnBuilder::finish)
            .collect::<Vec<_>>();
        let batch = RecordBatch::try_new(schema, columns)?;
        Chunk::try_new(batch, key)
    }
}
