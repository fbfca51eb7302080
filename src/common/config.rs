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
use crate::flowjoin_config::config as flowjoin_app_config;

pub(crate) fn chunk_buffer_rows() -> usize {
    flowjoin_app_config()
        .ok()
        .map(|c| c.runtime.chunk_buffer_rows)
        .unwrap_or(1024)
}

/// `None` when no byte ceiling is configured.
pub(crate) fn mem_limit_bytes() -> Option<i64> {
    flowjoin_app_config()
        .ok()
        .map(|c| c.runtime.mem_limit_bytes)
        .filter(|limit| *limit > 0)
        .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX))
}

pub(crate) fn message_queue_capacity() -> usize {
    flowjoin_app_config()
        .ok()
        .map(|c| c.runtime.message_queue_capacity)
        .unwrap_or(64)
}

pub(crate) fn debug_log_join_products() -> bool {
    flowjoin_app_config()
        .ok()
        .map(|c| c.debug.log_join_products)
        .unwrap_or(false)
}
