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
//! Sort-merge join over group-keyed, join-column-sorted chunk streams.
//!
//! Responsibilities:
//! - Cuts each input into join-key runs and pairs runs with equal keys.
//! - Expands each pair through the row function under inner/left/right/full rules.
//!
//! Key exported interfaces:
//! - Types: `MergeJoinTransformation`, `MergeJoinOperatorFactory`, `MergeJoinOptions`.

mod join_fn;
mod join_key;
mod join_product;
mod join_state;
mod merge_join_processor;
mod output_builder;
mod side_buffer;

pub use merge_join_processor::{
    MergeJoinOperatorFactory, MergeJoinOptions, MergeJoinTransformation,
};
