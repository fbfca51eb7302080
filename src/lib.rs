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
pub mod common;
pub mod exec;
pub mod runtime;

// Short aliases for the config and logging modules.
pub use common::app_config as flowjoin_config;
pub use common::logging as flowjoin_logging;

pub use common::status::{Status, StatusCode, StatusResult};
pub use common::types::{ColumnMeta, ColumnType, Datum, GroupKey, Record};
pub use exec::chunk::Chunk;
pub use exec::expr::{ClosureFn, Operand, ProjectionFn, RowEvaluator};
pub use exec::node::join::{ColumnPair, JoinMethod, JoinSide, MergeJoinNode};
pub use exec::operators::mergejoin::{
    MergeJoinOperatorFactory, MergeJoinOptions, MergeJoinTransformation,
};
pub use exec::pipeline::operator::{InputMessage, MessageOperator, Operator};
pub use exec::pipeline::sink::{ChannelSink, ChunkSink, CollectSink, SinkEvent};
pub use runtime::join_driver::{JoinInput, MergeJoinDriver, run_streams};
pub use runtime::mem_tracker::MemTracker;
