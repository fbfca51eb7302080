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
use std::fmt;
use std::sync::Arc;

use crate::common::status::StatusResult;
use crate::common::types::{ColumnMeta, ColumnType, Record};
use crate::exec::expr::row_fn::{BoundRowFn, FunctionSignature, ReturnProperty, RowEvaluator};

type RowClosure = dyn Fn(&Record, &Record) -> StatusResult<Record> + Send + Sync;

/// Row function backed by a Rust closure plus an explicitly declared signature.
#[derive(Clone)]
pub struct ClosureFn {
    f: Arc<RowClosure>,
    signature: FunctionSignature,
}

impl ClosureFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Record, &Record) -> StatusResult<Record> + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(f),
            signature: FunctionSignature::default(),
        }
    }

    pub fn reads_left<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signature.left_params = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn reads_right<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signature.right_params = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn returns<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<ColumnType>)>,
        S: Into<String>,
    {
        self.signature.returns = props
            .into_iter()
            .map(|(name, ty)| ReturnProperty::new(name, ty))
            .collect();
        self
    }
}

impl fmt::Debug for ClosureFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureFn")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl RowEvaluator for ClosureFn {
    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn prepare(
        &self,
        _left: &[ColumnMeta],
        _right: &[ColumnMeta],
    ) -> StatusResult<Box<dyn BoundRowFn>> {
        Ok(Box::new(BoundClosure {
            f: Arc::clone(&self.f),
            returns: self.signature.returns.clone(),
        }))
    }
}

struct BoundClosure {
    f: Arc<RowClosure>,
    returns: Vec<ReturnProperty>,
}

impl BoundRowFn for BoundClosure {
    fn eval(&mut self, l: &Record, r: &Record) -> StatusResult<Record> {
        (self.f)(l, r)
    }

    fn return_type(&self) -> Vec<ReturnProperty> {
        self.returns.clone()
    }
}
