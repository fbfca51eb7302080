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
//! Logical memory accounting for join buffers and output chunks.
//!
//! `MemTracker` doubles as the allocator capability handed to the join engine:
//! `allocate` / `account` / `free` check an optional byte ceiling on the tracker
//! and every ancestor, and refuse with `RESOURCE_EXHAUSTED` instead of growing.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::common::status::{Status, StatusResult};

/// Reservation handle; dropping it returns the bytes to whichever tracker holds them.
#[derive(Debug)]
pub struct TrackedBytes {
    bytes: i64,
    tracker: Arc<MemTracker>,
}

impl TrackedBytes {
    pub fn new(bytes: usize, tracker: Arc<MemTracker>) -> Self {
        let bytes = i64::try_from(bytes).unwrap_or(i64::MAX);
        tracker.consume(bytes);
        Self { bytes, tracker }
    }

    /// Like `new`, but honours the limits of `tracker` and its ancestors.
    pub fn try_new(bytes: usize, tracker: Arc<MemTracker>) -> StatusResult<Self> {
        let bytes = i64::try_from(bytes).unwrap_or(i64::MAX);
        tracker.try_consume(bytes)?;
        Ok(Self { bytes, tracker })
    }

    pub fn bytes(&self) -> i64 {
        self.bytes
    }

    pub fn tracker(&self) -> &Arc<MemTracker> {
        &self.tracker
    }

    pub fn transfer_to(&mut self, tracker: Arc<MemTracker>) {
        if Arc::ptr_eq(&self.tracker, &tracker) {
            return;
        }
        self.tracker.release(self.bytes);
        tracker.consume(self.bytes);
        self.tracker = tracker;
    }
}

impl Drop for TrackedBytes {
    fn drop(&mut self) {
        self.tracker.release(self.bytes);
    }
}

/// Byte counter for one join component, rolled up into every ancestor.
///
/// Only bytes reported by callers are counted. A negative `limit` means unlimited.
#[derive(Debug)]
pub struct MemTracker {
    label: String,
    limit: i64,
    parent: Option<Arc<MemTracker>>,
    current: AtomicI64,
    peak: AtomicI64,
    allocated: AtomicI64,
    deallocated: AtomicI64,
}

impl MemTracker {
    /// Create a root tracker with no parent and no limit.
    pub fn new_root(label: impl Into<String>) -> Arc<Self> {
        Self::build(label.into(), -1, None)
    }

    /// Create a root tracker refusing to grow past `limit` bytes.
    pub fn new_root_with_limit(label: impl Into<String>, limit: Option<i64>) -> Arc<Self> {
        Self::build(label.into(), limit.unwrap_or(-1), None)
    }

    /// Create a child tracker with the provided parent.
    pub fn new_child(label: impl Into<String>, parent: &Arc<MemTracker>) -> Arc<Self> {
        Self::new_child_with_limit(label, None, parent)
    }

    pub fn new_child_with_limit(
        label: impl Into<String>,
        limit: Option<i64>,
        parent: &Arc<MemTracker>,
    ) -> Arc<Self> {
        Self::build(label.into(), limit.unwrap_or(-1), Some(Arc::clone(parent)))
    }

    fn build(label: String, limit: i64, parent: Option<Arc<MemTracker>>) -> Arc<Self> {
        Arc::new(Self {
            label,
            limit,
            parent,
            current: AtomicI64::new(0),
            peak: AtomicI64::new(0),
            allocated: AtomicI64::new(0),
            deallocated: AtomicI64::new(0),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn has_limit(&self) -> bool {
        self.limit >= 0
    }

    pub fn current(&self) -> i64 {
        self.current.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> i64 {
        self.peak.load(Ordering::Relaxed)
    }

    /// High-water mark; kept after the bytes are freed.
    pub fn max_allocated(&self) -> i64 {
        self.peak()
    }

    pub fn allocated(&self) -> i64 {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn deallocated(&self) -> i64 {
        self.deallocated.load(Ordering::Relaxed)
    }

    /// Increase consumption for this tracker and all ancestors, ignoring limits.
    pub fn consume(&self, bytes: i64) {
        if bytes <= 0 {
            return;
        }
        let mut tracker: Option<&MemTracker> = Some(self);
        while let Some(current) = tracker {
            let new_value = current.current.fetch_add(bytes, Ordering::AcqRel) + bytes;
            current.allocated.fetch_add(bytes, Ordering::AcqRel);
            current.update_peak(new_value);
            tracker = current.parent.as_deref();
        }
    }

    /// Increase consumption unless it would push this tracker or an ancestor past
    /// its limit. On refusal nothing stays charged.
    pub fn try_consume(&self, bytes: i64) -> StatusResult<()> {
        if bytes <= 0 {
            return Ok(());
        }
        let mut charged: Vec<&MemTracker> = Vec::new();
        let mut tracker: Option<&MemTracker> = Some(self);
        while let Some(current) = tracker {
            let new_value = current.current.fetch_add(bytes, Ordering::AcqRel) + bytes;
            if current.has_limit() && new_value > current.limit {
                current.current.fetch_sub(bytes, Ordering::AcqRel);
                for done in charged {
                    done.current.fetch_sub(bytes, Ordering::AcqRel);
                }
                return Err(Status::resource_exhausted(format!(
                    "memory limit exceeded: tracker '{}' limit={} current={} requested={}",
                    current.label,
                    current.limit,
                    new_value - bytes,
                    bytes
                )));
            }
            charged.push(current);
            tracker = current.parent.as_deref();
        }
        for current in charged {
            current.allocated.fetch_add(bytes, Ordering::AcqRel);
            current.update_peak(current.current());
        }
        Ok(())
    }

    /// Decrease consumption for this tracker and all ancestors.
    pub fn release(&self, bytes: i64) {
        if bytes <= 0 {
            return;
        }
        let mut tracker: Option<&MemTracker> = Some(self);
        while let Some(current) = tracker {
            current.current.fetch_sub(bytes, Ordering::AcqRel);
            current.deallocated.fetch_add(bytes, Ordering::AcqRel);
            tracker = current.parent.as_deref();
        }
    }

    /// Reserve `bytes`, returning a handle that gives them back on drop.
    pub fn allocate(self: &Arc<Self>, bytes: usize) -> StatusResult<TrackedBytes> {
        TrackedBytes::try_new(bytes, Arc::clone(self))
    }

    /// Signed adjustment: positive deltas are limit-checked, negative ones free.
    pub fn account(&self, delta: i64) -> StatusResult<()> {
        if delta >= 0 {
            self.try_consume(delta)
        } else {
            self.release(delta.saturating_neg());
            Ok(())
        }
    }

    /// Return a reservation made by `allocate`.
    pub fn free(&self, bytes: TrackedBytes) {
        drop(bytes);
    }

    fn update_peak(&self, value: i64) {
        let mut prev = self.peak.load(Ordering::Relaxed);
        while value > prev {
            match self
                .peak
                .compare_exchange(prev, value, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => prev = actual,
            }
        }
    }
}

static PROCESS_TRACKER: OnceLock<Arc<MemTracker>> = OnceLock::new();

/// Root of every tracker created without an explicit parent.
pub fn process_mem_tracker() -> Arc<MemTracker> {
    Arc::clone(PROCESS_TRACKER.get_or_init(|| MemTracker::new_root("process")))
}
