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
//! Streaming sort-merge join transformation.
//!
//! Responsibilities:
//! - Consumes chunk / flush-key / finish messages from the left and right inputs.
//! - Keeps one `JoinState` per group key and joins products as soon as they are safe.
//! - Emits output chunks downstream while input is still arriving.
//!
//! Key exported interfaces:
//! - Types: `MergeJoinTransformation`, `MergeJoinOperatorFactory`, `MergeJoinOptions`.
//!
//! Current limitations:
//! - Inputs must be sorted on the join columns within every group key; a descending
//!   key or a refilled product is surfaced as an internal error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::common::config;
use crate::common::status::{Status, StatusResult};
use crate::common::types::{ColumnMeta, GroupKey, schema_union};
use crate::exec::chunk::Chunk;
use crate::exec::expr::row_fn::RowEvaluator;
use crate::exec::node::join::{JoinSide, MergeJoinNode};
use crate::exec::pipeline::operator::{InputMessage, MessageOperator, Operator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::exec::pipeline::sink::ChunkSink;
use crate::flowjoin_logging::{debug, trace, warn};
use crate::runtime::mem_tracker::{MemTracker, process_mem_tracker};

use super::join_fn::{OutputTarget, RowJoinFn};
use super::join_product::JoinProduct;
use super::join_state::JoinState;

/// Per-transformation knobs; defaults come from `flowjoin.toml`.
#[derive(Clone, Debug)]
pub struct MergeJoinOptions {
    pub chunk_buffer_rows: usize,
    /// Tracker charged for output chunks. A child of the process tracker with the
    /// configured byte limit is created when unset.
    pub mem_tracker: Option<Arc<MemTracker>>,
    pub log_join_products: bool,
}

impl MergeJoinOptions {
    pub fn from_config() -> Self {
        Self {
            chunk_buffer_rows: config::chunk_buffer_rows(),
            mem_tracker: None,
            log_join_products: config::debug_log_join_products(),
        }
    }

    pub fn with_chunk_buffer_rows(mut self, rows: usize) -> Self {
        self.chunk_buffer_rows = rows.max(1);
        self
    }

    pub fn with_mem_tracker(mut self, tracker: Arc<MemTracker>) -> Self {
        self.mem_tracker = Some(tracker);
        self
    }
}

impl Default for MergeJoinOptions {
    fn default() -> Self {
        Self::from_config()
    }
}

/// Joins two group-keyed, join-column-sorted chunk streams.
pub struct MergeJoinTransformation {
    name: String,
    node: MergeJoinNode,
    join_fn: RowJoinFn,
    states: HashMap<GroupKey, JoinState>,
    /// Union of every schema seen per side, across group keys.
    left_schema: Vec<ColumnMeta>,
    right_schema: Vec<ColumnMeta>,
    left_finished: bool,
    right_finished: bool,
    finished: bool,
    error: Option<Status>,
    sink: Box<dyn ChunkSink>,
    mem_tracker: Arc<MemTracker>,
    chunk_buffer_rows: usize,
    log_join_products: bool,
}

impl MergeJoinTransformation {
    pub fn new(
        node: MergeJoinNode,
        evaluator: Arc<dyn RowEvaluator>,
        sink: Box<dyn ChunkSink>,
        options: MergeJoinOptions,
    ) -> Self {
        let name = operator_name(&node);
        let mem_tracker = options.mem_tracker.unwrap_or_else(|| {
            MemTracker::new_child_with_limit(
                name.clone(),
                config::mem_limit_bytes(),
                &process_mem_tracker(),
            )
        });
        debug!(
            "{}: created method={} on={:?}",
            name,
            node.method(),
            node.on()
        );
        Self {
            name,
            node,
            join_fn: RowJoinFn::new(evaluator),
            states: HashMap::new(),
            left_schema: Vec::new(),
            right_schema: Vec::new(),
            left_finished: false,
            right_finished: false,
            finished: false,
            error: None,
            sink,
            mem_tracker,
            chunk_buffer_rows: options.chunk_buffer_rows.max(1),
            log_join_products: options.log_join_products,
        }
    }

    pub fn mem_tracker(&self) -> &Arc<MemTracker> {
        &self.mem_tracker
    }

    /// Group keys that still hold buffered rows or pending products.
    pub fn active_group_keys(&self) -> usize {
        self.states.len()
    }

    fn process_chunk(&mut self, side: JoinSide, chunk: Chunk) -> StatusResult<()> {
        let mut state = self.take_state(chunk.key());
        if chunk.is_empty() {
            self.states.insert(state.group_key().clone(), state);
            return Ok(());
        }
        match side {
            JoinSide::Left => schema_union(&mut self.left_schema, chunk.cols()),
            JoinSide::Right => schema_union(&mut self.right_schema, chunk.cols()),
        }
        state.side_mut(side).observe(&chunk)?;
        while let Some((join_key, rows)) = state.side_mut(side).scan(&chunk)? {
            if let Some(through) = state.insert(join_key, rows, side)? {
                let products = state.take_through(through);
                self.evaluate(&state, products)?;
            }
        }
        self.states.insert(state.group_key().clone(), state);
        Ok(())
    }

    fn flush_key(&mut self, side: JoinSide, key: GroupKey) -> StatusResult<()> {
        let mut state = self.take_state(&key);
        state.side_mut(side).mark_done();
        if !state.is_finished() {
            self.states.insert(key, state);
            return Ok(());
        }
        self.flush_state(&mut state)?;
        debug!("{}: flushed group key {}", self.name, key);
        Ok(())
    }

    fn finish_side(&mut self, side: JoinSide) -> StatusResult<()> {
        match side {
            JoinSide::Left => self.left_finished = true,
            JoinSide::Right => self.right_finished = true,
        }
        debug!("{}: {} input finished", self.name, side);
        if !(self.left_finished && self.right_finished) {
            return Ok(());
        }
        let states = self.states.drain().map(|(_, s)| s).collect::<Vec<_>>();
        for mut state in states {
            self.flush_state(&mut state)?;
        }
        self.finish(None);
        Ok(())
    }

    /// Drain both side buffers and join every remaining product.
    fn flush_state(&mut self, state: &mut JoinState) -> StatusResult<()> {
        state.flush_sides()?;
        let products = state.take_all();
        self.evaluate(state, products)
    }

    fn evaluate(&mut self, state: &JoinState, products: Vec<JoinProduct>) -> StatusResult<()> {
        if products.is_empty() {
            return Ok(());
        }
        let left = side_schema(state, JoinSide::Left, &self.left_schema);
        let right = side_schema(state, JoinSide::Right, &self.right_schema);
        self.join_fn.prepare(left, right)?;

        let target = OutputTarget {
            chunk_buffer_rows: self.chunk_buffer_rows,
            tracker: &self.mem_tracker,
        };
        for product in products {
            if self.log_join_products {
                debug!(
                    "{}: joining group={} key={}",
                    self.name,
                    state.group_key(),
                    product.key()
                );
            } else {
                trace!(
                    "{}: joining group={} key={}",
                    self.name,
                    state.group_key(),
                    product.key()
                );
            }
            let sink = &mut self.sink;
            self.join_fn.eval_product(
                product,
                self.node.method(),
                state.group_key(),
                &target,
                &mut |chunk| sink.process(chunk),
            )?;
        }
        Ok(())
    }

    fn take_state(&mut self, key: &GroupKey) -> JoinState {
        self.states
            .remove(key)
            .unwrap_or_else(|| JoinState::new(key.clone(), &self.node))
    }

    fn finish(&mut self, error: Option<Status>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.states.clear();
        self.error = error.clone();
        self.sink.finish(error);
    }
}

/// The side's own schema for this group key, or the side-wide union when the
/// group key has not been seen on that side.
fn side_schema<'a>(
    state: &'a JoinState,
    side: JoinSide,
    fallback: &'a [ColumnMeta],
) -> &'a [ColumnMeta] {
    let own = state.side(side).schema();
    if own.is_empty() { fallback } else { own }
}

fn operator_name(node: &MergeJoinNode) -> String {
    if node.node_id >= 0 {
        format!("MergeJoin (id={})", node.node_id)
    } else {
        "MergeJoin".to_string()
    }
}

impl Operator for MergeJoinTransformation {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_mem_tracker(&mut self, tracker: Arc<MemTracker>) {
        self.mem_tracker = tracker;
    }

    fn close(&mut self) -> StatusResult<()> {
        self.states.clear();
        Ok(())
    }

    fn cancel(&mut self) {
        if !self.finished {
            warn!("{}: cancelled with {} open group keys", self.name, self.states.len());
            self.finish(Some(Status::cancelled(format!("{} cancelled", self.name))));
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

impl MessageOperator for MergeJoinTransformation {
    fn process_message(&mut self, message: InputMessage) -> StatusResult<()> {
        if self.finished {
            trace!("{}: ignoring {} message after finish", self.name, message.side());
            return Ok(());
        }
        let result = match message {
            InputMessage::Chunk { side, chunk } => self.process_chunk(side, chunk),
            InputMessage::FlushKey { side, key } => self.flush_key(side, key),
            InputMessage::Finish {
                side,
                error: Some(err),
            } => {
                warn!("{}: {} input failed: {}", self.name, side, err);
                self.finish(Some(err));
                return Ok(());
            }
            InputMessage::Finish { side, error: None } => self.finish_side(side),
        };
        if let Err(err) = &result {
            warn!("{}: aborting join: {}", self.name, err);
            self.finish(Some(err.clone()));
        }
        result
    }

    fn final_error(&self) -> Option<&Status> {
        self.error.as_ref()
    }
}

/// Builds one `MergeJoinTransformation` per driver.
pub struct MergeJoinOperatorFactory {
    name: String,
    node: MergeJoinNode,
    evaluator: Arc<dyn RowEvaluator>,
    options: MergeJoinOptions,
}

impl MergeJoinOperatorFactory {
    pub fn new(
        node: MergeJoinNode,
        evaluator: Arc<dyn RowEvaluator>,
        options: MergeJoinOptions,
    ) -> Self {
        Self {
            name: operator_name(&node),
            node,
            evaluator,
            options,
        }
    }
}

impl OperatorFactory for MergeJoinOperatorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, sink: Box<dyn ChunkSink>) -> Box<dyn MessageOperator> {
        Box::new(MergeJoinTransformation::new(
            self.node.clone(),
            Arc::clone(&self.evaluator),
            sink,
            self.options.clone(),
        ))
    }
}
