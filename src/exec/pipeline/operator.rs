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
//! Core operator traits for message-driven stages.
//!
//! Responsibilities:
//! - Defines the base operator lifecycle and the two-input message contract.
//! - Used by the join driver to feed one operator from concurrent producers.
//!
//! Key exported interfaces:
//! - Types: `InputMessage`, `Operator`, `MessageOperator`.

use std::sync::Arc;

use crate::common::status::{Status, StatusResult};
use crate::common::types::GroupKey;
use crate::exec::chunk::Chunk;
use crate::exec::node::join::JoinSide;
use crate::runtime::mem_tracker::MemTracker;

/// One event from either upstream of a two-input stage.
#[derive(Debug, Clone)]
pub enum InputMessage {
    /// Rows for the chunk's group key.
    Chunk { side: JoinSide, chunk: Chunk },
    /// No more rows for `key` will arrive on `side`.
    FlushKey { side: JoinSide, key: GroupKey },
    /// `side` has ended, successfully or with an upstream error.
    Finish {
        side: JoinSide,
        error: Option<Status>,
    },
}

impl InputMessage {
    pub fn side(&self) -> JoinSide {
        match self {
            InputMessage::Chunk { side, .. }
            | InputMessage::FlushKey { side, .. }
            | InputMessage::Finish { side, .. } => *side,
        }
    }

    pub fn chunk(side: JoinSide, chunk: Chunk) -> Self {
        InputMessage::Chunk { side, chunk }
    }

    pub fn flush_key(side: JoinSide, key: GroupKey) -> Self {
        InputMessage::FlushKey { side, key }
    }

    pub fn finish(side: JoinSide) -> Self {
        InputMessage::Finish { side, error: None }
    }

    pub fn fail(side: JoinSide, error: Status) -> Self {
        InputMessage::Finish {
            side,
            error: Some(error),
        }
    }
}

/// Base operator contract.
pub trait Operator: Send {
    fn name(&self) -> &str;

    fn set_mem_tracker(&mut self, tracker: Arc<MemTracker>) {
        let _ = tracker;
    }

    fn prepare(&mut self) -> StatusResult<()> {
        Ok(())
    }

    fn close(&mut self) -> StatusResult<()> {
        Ok(())
    }

    fn cancel(&mut self) {
        // Default: nothing to cancel.
    }

    fn is_finished(&self) -> bool {
        false
    }
}

/// Operator driven by `InputMessage`s. Calls are serialized by the owner.
pub trait MessageOperator: Operator {
    fn process_message(&mut self, message: InputMessage) -> StatusResult<()>;

    /// The error the operator terminated with, if it did.
    fn final_error(&self) -> Option<&Status> {
        None
    }
}
