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
//! Row combination: binds the user row function to observed schemas, expands one
//! join product into output rows and infers the output layout.
//!
//! Responsibilities:
//! - Checks that every column the function reads exists on its side.
//! - Applies join-method default rows when one side of a product is empty.
//! - Evaluates the cross product and enforces the group-key invariant per row.
//! - Fixes the output schema from the first evaluated row.
//!
//! Key exported interfaces:
//! - Types: `RowJoinFn`, `OutputTarget`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::common::status::{Status, StatusResult};
use crate::common::types::{ColumnMeta, ColumnType, Datum, GroupKey, Record};
use crate::exec::chunk::Chunk;
use crate::exec::expr::row_fn::{BoundRowFn, ReturnProperty, RowEvaluator};
use crate::exec::node::join::JoinMethod;
use crate::runtime::mem_tracker::MemTracker;

use super::join_product::{JoinProduct, JoinRows};
use super::output_builder::OutputBuilder;

/// Where evaluated rows are charged and how large each emitted chunk may be.
pub(crate) struct OutputTarget<'a> {
    pub(crate) chunk_buffer_rows: usize,
    pub(crate) tracker: &'a Arc<MemTracker>,
}

struct PreparedFn {
    left: Vec<ColumnMeta>,
    right: Vec<ColumnMeta>,
    bound: Box<dyn BoundRowFn>,
}

pub(crate) struct RowJoinFn {
    evaluator: Arc<dyn RowEvaluator>,
    prepared: Option<PreparedFn>,
    schema: Option<Vec<ColumnMeta>>,
}

impl RowJoinFn {
    pub(crate) fn new(evaluator: Arc<dyn RowEvaluator>) -> Self {
        Self {
            evaluator,
            prepared: None,
            schema: None,
        }
    }

    /// Output layout, fixed by the first evaluated row.
    #[cfg(test)]
    pub(crate) fn output_schema(&self) -> Option<&[ColumnMeta]> {
        self.schema.as_deref()
    }

    /// Bind the row function to the given side schemas. Rebinding is skipped while
    /// the schemas stay the same.
    pub(crate) fn prepare(&mut self, left: &[ColumnMeta], right: &[ColumnMeta]) -> StatusResult<()> {
        if let Some(prepared) = self.prepared.as_ref() {
            if prepared.left == left && prepared.right == right {
                return Ok(());
            }
        }
        let signature = self.evaluator.signature();
        check_cols(&signature.left_params, left)
            .map_err(|e| e.with_context("error preparing left side of join"))?;
        check_cols(&signature.right_params, right)
            .map_err(|e| e.with_context("error preparing right side of join"))?;
        let bound = self.evaluator.prepare(left, right)?;
        self.prepared = Some(PreparedFn {
            left: left.to_vec(),
            right: right.to_vec(),
            bound,
        });
        Ok(())
    }

    /// Combine every left row of `product` with every right row and hand the
    /// output to `emit` in chunks of at most `chunk_buffer_rows` rows.
    ///
    /// Each chunk is charged to the tracker when it is sealed, so a product that
    /// outgrows the limit fails before the rest of it is built. Nothing is
    /// emitted when the method drops an unmatched side.
    pub(crate) fn eval_product(
        &mut self,
        product: JoinProduct,
        method: JoinMethod,
        group_key: &GroupKey,
        target: &OutputTarget<'_>,
        emit: &mut dyn FnMut(Chunk) -> StatusResult<()>,
    ) -> StatusResult<()> {
        let Self {
            prepared, schema, ..
        } = self;
        let prepared = prepared
            .as_mut()
            .ok_or_else(|| Status::internal("row function evaluated before prepare"))?;

        let (key, left, right) = product.into_parts();
        if left.is_empty() && right.is_empty() {
            return Err(Status::internal(format!(
                "tried to join on an empty set (key {})",
                key
            )));
        }
        let Some(left_rows) =
            side_records(&left, &prepared.left, group_key, method.preserves_right())?
        else {
            return Ok(());
        };
        let Some(right_rows) =
            side_records(&right, &prepared.right, group_key, method.preserves_left())?
        else {
            return Ok(());
        };

        let max_rows = target.chunk_buffer_rows.max(1);
        let capacity = left_rows
            .len()
            .saturating_mul(right_rows.len())
            .min(max_rows);
        let mut builder: Option<OutputBuilder> = None;
        for l in &left_rows {
            for r in &right_rows {
                let joined = prepared.bound.eval(l, r)?;
                validate_group_key(&joined, group_key)?;
                if schema.is_none() {
                    *schema = Some(create_schema(
                        &joined,
                        &prepared.bound.return_type(),
                        group_key,
                    )?);
                }
                let b = builder.get_or_insert_with(|| {
                    OutputBuilder::new(schema.clone().unwrap_or_default(), capacity)
                });
                b.append_record(&joined)?;
                if b.len() >= max_rows {
                    if let Some(full) = builder.take() {
                        emit(seal(full, group_key, target.tracker)?)?;
                    }
                }
            }
        }
        match builder {
            Some(rest) => emit(seal(rest, group_key, target.tracker)?),
            None => Ok(()),
        }
    }
}

fn seal(
    builder: OutputBuilder,
    group_key: &GroupKey,
    tracker: &Arc<MemTracker>,
) -> StatusResult<Chunk> {
    let mut chunk = builder.finish(group_key.clone())?;
    chunk.try_account(tracker)?;
    Ok(chunk)
}

/// Records for one side of a product. An empty side becomes a single default row
/// when `keep_unmatched` is set and `None` (no output) otherwise.
fn side_records(
    rows: &JoinRows,
    shape: &[ColumnMeta],
    group_key: &GroupKey,
    keep_unmatched: bool,
) -> StatusResult<Option<Vec<Record>>> {
    if !rows.is_empty() {
        return rows.records(shape).map(Some);
    }
    if !keep_unmatched {
        return Ok(None);
    }
    Ok(Some(vec![default_row(group_key, shape)]))
}

/// Group-key columns carry the key's value; every other column is null.
fn default_row(group_key: &GroupKey, shape: &[ColumnMeta]) -> Record {
    shape
        .iter()
        .map(|col| {
            let value = group_key.value(&col.name).cloned().unwrap_or(Datum::Null);
            (col.name.clone(), value)
        })
        .collect()
}

fn check_cols(params: &[String], cols: &[ColumnMeta]) -> StatusResult<()> {
    for name in params {
        if cols.is_empty() {
            return Err(Status::invalid("cannot join on an empty table"));
        }
        if !cols.iter().any(|c| &c.name == name) {
            return Err(Status::invalid(format!("table is missing label {}", name)));
        }
    }
    Ok(())
}

fn validate_group_key(record: &Record, group_key: &GroupKey) -> StatusResult<()> {
    for (col, value) in group_key.iter() {
        if record.get(&col.name) != Some(value) {
            return Err(Status::invalid(format!(
                "join cannot modify group key: output record has a missing or invalid value for column '{}'",
                col
            )));
        }
    }
    Ok(())
}

/// Sorted union of declared and produced property names. Declared types win over
/// observed value kinds; untyped nulls are left out.
fn create_schema(
    record: &Record,
    returns: &[ReturnProperty],
    group_key: &GroupKey,
) -> StatusResult<Vec<ColumnMeta>> {
    let mut declared: HashMap<&str, Option<ColumnType>> = HashMap::new();
    for prop in returns {
        declared.entry(prop.name.as_str()).or_insert(prop.ty);
    }
    let names = record
        .iter()
        .map(|(name, _)| name)
        .chain(declared.keys().copied())
        .collect::<BTreeSet<_>>();

    let mut cols = Vec::with_capacity(names.len());
    for name in names {
        let value = record.get(name);
        let ty = declared
            .get(name)
            .copied()
            .flatten()
            .or_else(|| value.and_then(Datum::column_type));
        match ty {
            Some(ty) => cols.push(ColumnMeta::new(name, ty)),
            None => {
                if let Some(v @ Datum::List(_)) = value {
                    return Err(Status::invalid(format!(
                        "output property \"{}\" is {} type which is not supported in a table column",
                        name,
                        v.kind_name()
                    )));
                }
                if let Some(col) = group_key.cols().find(|c| c.name == name) {
                    cols.push(col.clone());
                }
            }
        }
    }
    Ok(cols)
}
