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
//! Row functions the join evaluates per left/right row pair.
//!
//! Key exported interfaces:
//! - Traits: `RowEvaluator`, `BoundRowFn`.
//! - Types: `FunctionSignature`, `ReturnProperty`, `ProjectionFn`, `Operand`, `ClosureFn`.

pub mod closure;
pub mod projection;
pub mod row_fn;

pub use closure::ClosureFn;
pub use projection::{Operand, ProjectionFn};
pub use row_fn::{BoundRowFn, FunctionSignature, ReturnProperty, RowEvaluator};
