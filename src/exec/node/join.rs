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
use std::str::FromStr;

use crate::common::status::Status;

/// Join semantics for rows whose join key has no partner on the other side.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum JoinMethod {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinMethod::Inner => "inner",
            JoinMethod::Left => "left",
            JoinMethod::Right => "right",
            JoinMethod::Full => "full",
        }
    }

    /// Whether left rows without a right partner still produce output.
    pub fn preserves_left(self) -> bool {
        matches!(self, JoinMethod::Left | JoinMethod::Full)
    }

    /// Whether right rows without a left partner still produce output.
    pub fn preserves_right(self) -> bool {
        matches!(self, JoinMethod::Right | JoinMethod::Full)
    }
}

impl FromStr for JoinMethod {
    type Err = Status;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inner" => Ok(JoinMethod::Inner),
            "left" => Ok(JoinMethod::Left),
            "right" => Ok(JoinMethod::Right),
            "full" => Ok(JoinMethod::Full),
            other => Err(Status::invalid(format!(
                "invalid join method '{}': expected one of inner, left, right, full",
                other
            ))),
        }
    }
}

impl fmt::Display for JoinMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One equality predicate `left.<left> == right.<right>`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ColumnPair {
    pub left: String,
    pub right: String,
}

impl ColumnPair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Which input of a two-input operator a message belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum JoinSide {
    Left,
    Right,
}

impl JoinSide {
    pub fn is_left(self) -> bool {
        matches!(self, JoinSide::Left)
    }

    pub fn opposite(self) -> Self {
        match self {
            JoinSide::Left => JoinSide::Right,
            JoinSide::Right => JoinSide::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JoinSide::Left => "left",
            JoinSide::Right => "right",
        }
    }
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plan-time description of a sort-merge join.
///
/// The planner guarantees both inputs arrive sorted by `required_sort(side)`
/// within every group key; the engine relies on it and never re-sorts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MergeJoinNode {
    pub node_id: i32,
    on: Vec<ColumnPair>,
    method: JoinMethod,
}

impl MergeJoinNode {
    pub fn try_new(node_id: i32, on: Vec<ColumnPair>, method: &str) -> Result<Self, Status> {
        let method = method.parse::<JoinMethod>()?;
        Self::with_method(node_id, on, method)
    }

    pub fn with_method(
        node_id: i32,
        on: Vec<ColumnPair>,
        method: JoinMethod,
    ) -> Result<Self, Status> {
        if on.is_empty() {
            return Err(Status::invalid(
                "merge join requires at least one column pair in `on`",
            ));
        }
        for (idx, pair) in on.iter().enumerate() {
            if pair.left.is_empty() || pair.right.is_empty() {
                return Err(Status::invalid(format!(
                    "join column pair {} has an empty column name",
                    idx
                )));
            }
            if on[..idx].iter().any(|p| p.left == pair.left) {
                return Err(Status::invalid(format!(
                    "left join column '{}' listed twice",
                    pair.left
                )));
            }
            if on[..idx].iter().any(|p| p.right == pair.right) {
                return Err(Status::invalid(format!(
                    "right join column '{}' listed twice",
                    pair.right
                )));
            }
        }
        Ok(Self {
            node_id,
            on,
            method,
        })
    }

    pub fn on(&self) -> &[ColumnPair] {
        &self.on
    }

    pub fn method(&self) -> JoinMethod {
        self.method
    }

    pub fn left_columns(&self) -> Vec<String> {
        self.on.iter().map(|p| p.left.clone()).collect()
    }

    pub fn right_columns(&self) -> Vec<String> {
        self.on.iter().map(|p| p.right.clone()).collect()
    }

    pub fn join_columns(&self, side: JoinSide) -> Vec<String> {
        match side {
            JoinSide::Left => self.left_columns(),
            JoinSide::Right => self.right_columns(),
        }
    }

    /// Ascending sort the upstream of `side` must provide, in key order.
    pub fn required_sort(&self, side: JoinSide) -> Vec<String> {
        self.join_columns(side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::status::StatusCode;

    #[test]
    fn parses_all_methods() {
        for (text, method) in [
            ("inner", JoinMethod::Inner),
            ("left", JoinMethod::Left),
            ("right", JoinMethod::Right),
            ("full", JoinMethod::Full),
        ] {
            assert_eq!(text.parse::<JoinMethod>().expect("method"), method);
            assert_eq!(method.to_string(), text);
        }
        let err = "outer".parse::<JoinMethod>().expect_err("unknown");
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert!(err.message().contains("'outer'"), "err={}", err);
    }

    #[test]
    fn node_requires_pairs() {
        let err = MergeJoinNode::try_new(1, vec![], "inner").expect_err("empty on");
        assert!(err.message().contains("at least one"), "err={}", err);
    }

    #[test]
    fn node_rejects_duplicate_columns() {
        let err = MergeJoinNode::try_new(
            1,
            vec![ColumnPair::new("a", "x"), ColumnPair::new("a", "y")],
            "left",
        )
        .expect_err("duplicate");
        assert!(err.message().contains("'a'"), "err={}", err);
    }

    #[test]
    fn node_exposes_sides() {
        let node = MergeJoinNode::try_new(
            7,
            vec![ColumnPair::new("label", "id"), ColumnPair::new("_time", "_time")],
            "full",
        )
        .expect("node");
        assert_eq!(node.method(), JoinMethod::Full);
        assert_eq!(node.required_sort(JoinSide::Left), vec!["label", "_time"]);
        assert_eq!(node.required_sort(JoinSide::Right), vec!["id", "_time"]);
        assert!(node.method().preserves_left() && node.method().preserves_right());
    }
}
