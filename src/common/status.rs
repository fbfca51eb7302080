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
//! Execution status shared by every join component.
//!
//! The engine never retries: any non-OK status aborts the transformation and is
//! forwarded downstream unchanged.

use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StatusCode {
    /// Bad configuration, bad input shape or a row function that broke an invariant.
    InvalidArgument,
    /// A broken precondition from the caller, usually unsorted input.
    Internal,
    /// The memory tracker refused an allocation.
    ResourceExhausted,
    /// The driver stopped before the transformation reached a terminal state.
    Cancelled,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::Internal => "INTERNAL_ERROR",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Status {
    code: StatusCode,
    message: String,
}

pub type StatusResult<T> = Result<T, Status>;

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ResourceExhausted, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Cancelled, message)
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message, keeping the code.
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        Self {
            code: self.code,
            message: format!("{}: {}", context, self.message),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Status {}

impl From<arrow::error::ArrowError> for Status {
    fn from(err: arrow::error::ArrowError) -> Self {
        Status::internal(format!("arrow error: {err}"))
    }
}
