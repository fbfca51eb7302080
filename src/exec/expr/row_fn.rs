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
//! Row evaluator capability used by the merge join.
//!
//! Responsibilities:
//! - Describes the declared shape of a two-argument `(l, r) => record` function.
//! - Binds such a function to concrete left/right schemas and evaluates it per row pair.
//!
//! Key exported interfaces:
//! - Types: `FunctionSignature`, `ReturnProperty`, `RowEvaluator`, `BoundRowFn`.
//!
//! The join core never inspects function bodies; everything it needs to know is in
//! the signature or comes back from `prepare`.

use crate::common::status::StatusResult;
use crate::common::types::{ColumnMeta, ColumnType, Record};

/// One property of the record a row function returns.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReturnProperty {
    pub name: String,
    /// `None` when the type is only known from the produced values.
    pub ty: Option<ColumnType>,
}

impl ReturnProperty {
    pub fn new(name: impl Into<String>, ty: Option<ColumnType>) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Declared parameters and return shape of a row function.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FunctionSignature {
    /// Columns read from the left record.
    pub left_params: Vec<String>,
    /// Columns read from the right record.
    pub right_params: Vec<String>,
    pub returns: Vec<ReturnProperty>,
}

/// A row function that can be bound to schemas.
pub trait RowEvaluator: Send + Sync {
    fn signature(&self) -> &FunctionSignature;

    /// Bind to the columns observed on each side. `left`/`right` are the schemas the
    /// records passed to `eval` will carry.
    fn prepare(
        &self,
        left: &[ColumnMeta],
        right: &[ColumnMeta],
    ) -> StatusResult<Box<dyn BoundRowFn>>;
}

/// A row function bound to concrete schemas.
pub trait BoundRowFn: Send {
    fn eval(&mut self, l: &Record, r: &Record) -> StatusResult<Record>;

    /// Return properties with types resolved against the bound schemas.
    fn return_type(&self) -> Vec<ReturnProperty>;
}
