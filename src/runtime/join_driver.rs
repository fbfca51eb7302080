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
//! Actor that owns one two-input operator and serializes its messages.
//!
//! Responsibilities:
//! - Runs the operator on a dedicated thread fed by a bounded channel.
//! - Hands out per-side `JoinInput` handles that producer threads use concurrently.
//! - Reports the operator's terminal status from `join`.
//!
//! Key exported interfaces:
//! - Types: `MergeJoinDriver`, `JoinInput`.
//! - Functions: `run_streams`.

use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;

use crate::common::config;
use crate::common::status::{Status, StatusCode, StatusResult};
use crate::common::types::GroupKey;
use crate::exec::chunk::Chunk;
use crate::exec::node::join::JoinSide;
use crate::exec::pipeline::operator::{InputMessage, MessageOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::exec::pipeline::sink::ChunkSink;
use crate::flowjoin_logging::{debug, warn};

/// Sending half for one side of the join. Clones may be used from any thread.
#[derive(Clone, Debug)]
pub struct JoinInput {
    side: JoinSide,
    tx: SyncSender<InputMessage>,
}

impl JoinInput {
    pub fn side(&self) -> JoinSide {
        self.side
    }

    pub fn send_chunk(&self, chunk: Chunk) -> StatusResult<()> {
        self.push(InputMessage::chunk(self.side, chunk))
    }

    pub fn flush_key(&self, key: GroupKey) -> StatusResult<()> {
        self.push(InputMessage::flush_key(self.side, key))
    }

    pub fn finish(&self, error: Option<Status>) -> StatusResult<()> {
        self.push(InputMessage::Finish {
            side: self.side,
            error,
        })
    }

    /// Forward a prebuilt message; it must belong to this handle's side.
    pub fn send(&self, message: InputMessage) -> StatusResult<()> {
        if message.side() != self.side {
            return Err(Status::internal(format!(
                "{} join input received a {} message",
                self.side,
                message.side()
            )));
        }
        self.push(message)
    }

    fn push(&self, message: InputMessage) -> StatusResult<()> {
        self.tx
            .send(message)
            .map_err(|_| Status::cancelled("merge join driver has stopped"))
    }
}

pub struct MergeJoinDriver {
    name: String,
    tx: SyncSender<InputMessage>,
    worker: thread::JoinHandle<StatusResult<()>>,
}

impl MergeJoinDriver {
    pub fn spawn(factory: &dyn OperatorFactory, sink: Box<dyn ChunkSink>) -> StatusResult<Self> {
        Self::spawn_with_capacity(factory, sink, config::message_queue_capacity())
    }

    pub fn spawn_with_capacity(
        factory: &dyn OperatorFactory,
        sink: Box<dyn ChunkSink>,
        queue_capacity: usize,
    ) -> StatusResult<Self> {
        let mut op = factory.create(sink);
        op.prepare()?;
        let name = factory.name().to_string();
        let (tx, rx) = sync_channel(queue_capacity.max(1));
        let worker = thread::Builder::new()
            .name(format!("{name} driver"))
            .spawn(move || drive(op, rx))
            .map_err(|e| Status::internal(format!("spawn {name} driver: {e}")))?;
        debug!("{}: driver started (queue_capacity={})", name, queue_capacity);
        Ok(Self { name, tx, worker })
    }

    pub fn input(&self, side: JoinSide) -> JoinInput {
        JoinInput {
            side,
            tx: self.tx.clone(),
        }
    }

    /// Wait for the operator to finish. Returns once every `JoinInput` is dropped
    /// or the operator reached a terminal state.
    pub fn join(self) -> StatusResult<()> {
        let Self { name, tx, worker } = self;
        drop(tx);
        let status = worker
            .join()
            .map_err(|_| Status::internal(format!("{name} driver panicked")))?;
        debug!("{}: driver exited ok={}", name, status.is_ok());
        status
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn drive(mut op: Box<dyn MessageOperator>, rx: Receiver<InputMessage>) -> StatusResult<()> {
    for message in rx.iter() {
        if op.process_message(message).is_err() || op.is_finished() {
            break;
        }
    }
    if !op.is_finished() {
        warn!("{}: all inputs closed before both sides finished", op.name());
        op.cancel();
    }
    op.close()?;
    match op.final_error() {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

/// Run a join over two message streams, each delivered from its own producer
/// thread, and return the terminal status.
pub fn run_streams<L, R>(
    factory: &dyn OperatorFactory,
    sink: Box<dyn ChunkSink>,
    left: L,
    right: R,
) -> StatusResult<()>
where
    L: IntoIterator<Item = InputMessage>,
    L::IntoIter: Send,
    R: IntoIterator<Item = InputMessage>,
    R::IntoIter: Send,
{
    let driver = MergeJoinDriver::spawn(factory, sink)?;
    let left_input = driver.input(JoinSide::Left);
    let right_input = driver.input(JoinSide::Right);
    let (left, right) = (left.into_iter(), right.into_iter());
    thread::scope(|s| {
        s.spawn(move || pump(left_input, left));
        s.spawn(move || pump(right_input, right));
    });
    driver.join()
}

fn pump(input: JoinInput, messages: impl Iterator<Item = InputMessage>) {
    for message in messages {
        if let Err(err) = input.send(message) {
            if err.code() == StatusCode::Cancelled {
                debug!("{} producer stopped: {}", input.side(), err);
            } else {
                warn!("{} producer failed: {}", input.side(), err);
            }
            return;
        }
    }
}
