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
//! Row groups and the per-key pairing slot.

use crate::common::status::{Status, StatusResult};
use crate::common::types::{ColumnMeta, Record};
use crate::exec::chunk::Chunk;
use crate::exec::node::join::JoinSide;

use super::join_key::JoinKey;

/// Row groups that share one join key, in arrival order.
///
/// Every entry is a zero-copy slice of an input chunk.
#[derive(Clone, Debug, Default)]
pub(crate) struct JoinRows {
    chunks: Vec<Chunk>,
}

impl JoinRows {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, chunk: Chunk) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub(crate) fn num_rows(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    /// Materialize every row shaped like `shape`.
    pub(crate) fn records(&self, shape: &[ColumnMeta]) -> StatusResult<Vec<Record>> {
        let mut out = Vec::with_capacity(self.num_rows());
        for chunk in &self.chunks {
            for row in 0..chunk.len() {
                out.push(chunk.record(row, shape)?);
            }
        }
        Ok(out)
    }
}

/// The left and right row groups collected for one join key.
#[derive(Debug)]
pub(crate) struct JoinProduct {
    key: JoinKey,
    left: Option<JoinRows>,
    right: Option<JoinRows>,
}

impl JoinProduct {
    pub(crate) fn new(key: JoinKey, rows: JoinRows, side: JoinSide) -> Self {
        let mut product = Self {
            key,
            left: None,
            right: None,
        };
        *product.slot_mut(side) = Some(rows);
        product
    }

    pub(crate) fn key(&self) -> &JoinKey {
        &self.key
    }

    /// Fill `side`; each side may be filled once per key.
    pub(crate) fn attach(&mut self, rows: JoinRows, side: JoinSide) -> StatusResult<()> {
        let key = self.key.to_string();
        let slot = self.slot_mut(side);
        if slot.is_some() {
            return Err(Status::internal(format!(
                "join product for key {} already has {} rows; input is not sorted on the join columns",
                key, side
            )));
        }
        *slot = Some(rows);
        Ok(())
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    /// Only `side` has been filled so far.
    pub(crate) fn has_only(&self, side: JoinSide) -> bool {
        match side {
            JoinSide::Left => self.left.is_some() && self.right.is_none(),
            JoinSide::Right => self.right.is_some() && self.left.is_none(),
        }
    }

    pub(crate) fn into_parts(self) -> (JoinKey, JoinRows, JoinRows) {
        (
            self.key,
            self.left.unwrap_or_default(),
            self.right.unwrap_or_default(),
        )
    }

    fn slot_mut(&mut self, side: JoinSide) -> &mut Option<JoinRows> {
        match side {
            JoinSide::Left => &mut self.left,
            JoinSide::Right => &mut self.right,
        }
    }
}
