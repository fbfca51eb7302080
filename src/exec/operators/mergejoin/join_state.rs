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
//! Per-group-key join state: both side buffers plus the ordered pending products.

use crate::common::status::StatusResult;
use crate::common::types::GroupKey;
use crate::exec::node::join::{JoinSide, MergeJoinNode};

use super::join_key::JoinKey;
use super::join_product::{JoinProduct, JoinRows};
use super::side_buffer::SideBuffer;

#[derive(Debug)]
pub(crate) struct JoinState {
    group_key: GroupKey,
    left: SideBuffer,
    right: SideBuffer,
    /// Ascending by join key.
    products: Vec<JoinProduct>,
}

impl JoinState {
    pub(crate) fn new(group_key: GroupKey, node: &MergeJoinNode) -> Self {
        Self {
            group_key,
            left: SideBuffer::new(JoinSide::Left, node.left_columns()),
            right: SideBuffer::new(JoinSide::Right, node.right_columns()),
            products: Vec::new(),
        }
    }

    pub(crate) fn group_key(&self) -> &GroupKey {
        &self.group_key
    }

    pub(crate) fn side(&self, side: JoinSide) -> &SideBuffer {
        match side {
            JoinSide::Left => &self.left,
            JoinSide::Right => &self.right,
        }
    }

    pub(crate) fn side_mut(&mut self, side: JoinSide) -> &mut SideBuffer {
        match side {
            JoinSide::Left => &mut self.left,
            JoinSide::Right => &mut self.right,
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_products(&self) -> usize {
        self.products.len()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.left.is_done() && self.right.is_done()
    }

    /// Place a completed run into its product and report the last position that
    /// may now be joined.
    ///
    /// A product joins as soon as both sides are filled. When it is not complete,
    /// everything before it can still be joined if the preceding product holds only
    /// the opposite side: this side's keys only grow, so nothing earlier can match.
    pub(crate) fn insert(
        &mut self,
        key: JoinKey,
        rows: JoinRows,
        side: JoinSide,
    ) -> StatusResult<Option<usize>> {
        let position = match self.products.iter().position(|p| !p.key().less(&key)) {
            Some(idx) if self.products[idx].key() == &key => {
                self.products[idx].attach(rows, side)?;
                idx
            }
            Some(idx) => {
                self.products.insert(idx, JoinProduct::new(key, rows, side));
                idx
            }
            None => {
                self.products.push(JoinProduct::new(key, rows, side));
                self.products.len() - 1
            }
        };

        if self.products[position].is_complete() {
            return Ok(Some(position));
        }
        if position > 0 && self.products[position - 1].has_only(side.opposite()) {
            return Ok(Some(position - 1));
        }
        Ok(None)
    }

    /// Remove products `0..=through` in key order.
    pub(crate) fn take_through(&mut self, through: usize) -> Vec<JoinProduct> {
        let end = (through + 1).min(self.products.len());
        self.products.drain(..end).collect()
    }

    /// Move the runs still buffered on both sides into the product list.
    pub(crate) fn flush_sides(&mut self) -> StatusResult<()> {
        for side in [JoinSide::Left, JoinSide::Right] {
            if let Some((key, rows)) = self.side_mut(side).flush() {
                self.insert(key, rows, side)?;
            }
        }
        Ok(())
    }

    pub(crate) fn take_all(&mut self) -> Vec<JoinProduct> {
        std::mem::take(&mut self.products)
    }
}
