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
//! Downstream endpoints for operator output.
//!
//! Responsibilities:
//! - Receives output chunks and the terminal status of an operator.
//!
//! Key exported interfaces:
//! - Types: `ChunkSink`, `CollectSink`, `ChannelSink`, `SinkEvent`.

use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::{Arc, Mutex};

use crate::common::status::{Status, StatusResult};
use crate::exec::chunk::Chunk;

/// Receives the output stream of one operator.
pub trait ChunkSink: Send {
    fn process(&mut self, chunk: Chunk) -> StatusResult<()>;

    /// Called exactly once, with the error the stream ended with, if any.
    fn finish(&mut self, error: Option<Status>);
}

#[derive(Debug, Default)]
struct Collected {
    chunks: Vec<Chunk>,
    finished: bool,
    error: Option<Status>,
}

/// Keeps every chunk in memory. Clones share the same buffer, so a clone kept by
/// the caller can read what the operator wrote.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    inner: Arc<Mutex<Collected>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.lock().chunks.clone()
    }

    pub fn total_rows(&self) -> usize {
        self.lock().chunks.iter().map(Chunk::len).sum()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    pub fn error(&self) -> Option<Status> {
        self.lock().error.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChunkSink for CollectSink {
    fn process(&mut self, chunk: Chunk) -> StatusResult<()> {
        self.lock().chunks.push(chunk);
        Ok(())
    }

    fn finish(&mut self, error: Option<Status>) {
        let mut guard = self.lock();
        guard.finished = true;
        guard.error = error;
    }
}

#[derive(Debug)]
pub enum SinkEvent {
    Chunk(Chunk),
    Finish(Option<Status>),
}

/// Forwards output over a bounded channel; `process` blocks while the channel is full.
pub struct ChannelSink {
    tx: SyncSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, Receiver<SinkEvent>) {
        let (tx, rx) = sync_channel(capacity);
        (Self { tx }, rx)
    }
}

impl ChunkSink for ChannelSink {
    fn process(&mut self, chunk: Chunk) -> StatusResult<()> {
        self.tx
            .send(SinkEvent::Chunk(chunk))
            .map_err(|_| Status::cancelled("output receiver dropped"))
    }

    fn finish(&mut self, error: Option<Status>) {
        // The receiver may already be gone; nothing is left to notify then.
        let _ = self.tx.send(SinkEvent::Finish(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::status::StatusCode;

    #[test]
    fn collect_sink_clones_share_state() {
        let handle = CollectSink::new();
        let mut sink = handle.clone();
        sink.process(Chunk::default()).expect("process");
        sink.finish(Some(Status::invalid("boom")));
        assert_eq!(handle.chunks().len(), 1);
        assert!(handle.is_finished());
        assert_eq!(handle.error().map(|e| e.code()), Some(StatusCode::InvalidArgument));
    }

    #[test]
    fn channel_sink_reports_dropped_receiver() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);
        let err = sink.process(Chunk::default()).expect_err("receiver gone");
        assert_eq!(err.code(), StatusCode::Cancelled);
    }
}
