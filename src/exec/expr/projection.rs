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
use std::sync::Arc;

use crate::common::status::{Status, StatusResult};
use crate::common::types::{ColumnMeta, ColumnType, Datum, Record};
use crate::exec::expr::row_fn::{BoundRowFn, FunctionSignature, ReturnProperty, RowEvaluator};

/// Source of one output property in a projection.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Left(String),
    Right(String),
    Literal(Datum),
}

/// Declarative row function: `(l, r) => ({out_a: l.x, out_b: r.y, out_c: 1})`.
#[derive(Clone, Debug)]
pub struct ProjectionFn {
    outputs: Arc<[(String, Operand)]>,
    signature: FunctionSignature,
}

impl ProjectionFn {
    pub fn new(outputs: Vec<(String, Operand)>) -> StatusResult<Self> {
        let mut signature = FunctionSignature::default();
        for (idx, (name, operand)) in outputs.iter().enumerate() {
            if outputs[..idx].iter().any(|(n, _)| n == name) {
                return Err(Status::invalid(format!(
                    "projection property '{}' defined twice",
                    name
                )));
            }
            match operand {
                Operand::Left(col) => push_unique(&mut signature.left_params, col),
                Operand::Right(col) => push_unique(&mut signature.right_params, col),
                Operand::Literal(value) => {
                    if matches!(value, Datum::List(_)) {
                        return Err(Status::invalid(format!(
                            "projection property '{}' cannot be an array literal",
                            name
                        )));
                    }
                }
            }
            signature.returns.push(ReturnProperty::new(
                name.clone(),
                match operand {
                    Operand::Literal(value) => value.column_type(),
                    _ => None,
                },
            ));
        }
        Ok(Self {
            outputs: Arc::from(outputs),
            signature,
        })
    }

    /// Shorthand for `(name, l.col)`.
    pub fn left(name: &str, col: &str) -> (String, Operand) {
        (name.to_string(), Operand::Left(col.to_string()))
    }

    /// Shorthand for `(name, r.col)`.
    pub fn right(name: &str, col: &str) -> (String, Operand) {
        (name.to_string(), Operand::Right(col.to_string()))
    }
}

fn push_unique(list: &mut Vec<String>, col: &str) {
    if !list.iter().any(|c| c == col) {
        list.push(col.to_string());
    }
}

fn lookup_type(cols: &[ColumnMeta], name: &str) -> Option<ColumnType> {
    cols.iter().find(|c| c.name == name).map(|c| c.ty)
}

impl RowEvaluator for ProjectionFn {
    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn prepare(
        &self,
        left: &[ColumnMeta],
        right: &[ColumnMeta],
    ) -> StatusResult<Box<dyn BoundRowFn>> {
        let returns = self
            .outputs
            .iter()
            .map(|(name, operand)| {
                let ty = match operand {
                    Operand::Left(col) => lookup_type(left, col),
                    Operand::Right(col) => lookup_type(right, col),
                    Operand::Literal(value) => value.column_type(),
                };
                ReturnProperty::new(name.clone(), ty)
            })
            .collect();
        Ok(Box::new(BoundProjection {
            outputs: Arc::clone(&self.outputs),
            returns,
        }))
    }
}

struct BoundProjection {
    outputs: Arc<[(String, Operand)]>,
    returns: Vec<ReturnProperty>,
}

impl BoundRowFn for BoundProjection {
    fn eval(&mut self, l: &Record, r: &Record) -> StatusResult<Record> {
        let mut out = Record::new();
        for (name, operand) in self.outputs.iter() {
            let value = match operand {
                Operand::Left(col) => l.get(col).cloned().unwrap_or(Datum::Null),
                Operand::Right(col) => r.get(col).cloned().unwrap_or(Datum::Null),
                Operand::Literal(value) => value.clone(),
            };
            out.set(name.clone(), value);
        }
        Ok(out)
    }

    fn return_type(&self) -> Vec<ReturnProperty> {
        self.returns.clone()
    }
}
