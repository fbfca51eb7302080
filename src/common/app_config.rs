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
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<FlowJoinConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static FlowJoinConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = path.as_ref().to_path_buf();
    let cfg = FlowJoinConfig::load_from_file(&path)?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

pub fn init_from_env_or_default() -> Result<&'static FlowJoinConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = config_path_from_env_or_default()?;
    let cfg = FlowJoinConfig::load_from_file(&path)?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

pub fn config() -> Result<&'static FlowJoinConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("FLOWJOIN_CONFIG") {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }

    let candidates = [PathBuf::from("flowjoin.toml")];
    for p in candidates {
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "missing config file: set $FLOWJOIN_CONFIG or create ./flowjoin.toml"
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct FlowJoinConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "flowjoin=debug,flowjoin::exec=trace"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

impl FlowJoinConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("load config: {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: FlowJoinConfig = toml::from_str(s).context("parse toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.runtime.chunk_buffer_rows == 0 {
            bail!("runtime.chunk_buffer_rows must be greater than 0");
        }
        if self.runtime.message_queue_capacity == 0 {
            bail!("runtime.message_queue_capacity must be greater than 0");
        }
        Ok(())
    }
}

impl Default for FlowJoinConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Max rows per emitted join output chunk.
    #[serde(default = "default_chunk_buffer_rows")]
    pub chunk_buffer_rows: usize,
    /// Byte ceiling for join output buffers; 0 means unlimited.
    #[serde(default)]
    pub mem_limit_bytes: u64,
    #[serde(default = "default_message_queue_capacity")]
    pub message_queue_capacity: usize,
}

fn default_chunk_buffer_rows() -> usize {
    1024
}
fn default_message_queue_capacity() -> usize {
    64
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chunk_buffer_rows: default_chunk_buffer_rows(),
            mem_limit_bytes: 0,
            message_queue_capacity: default_message_queue_capacity(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DebugConfig {
    /// Log every evaluated join product at debug level instead of trace.
    #[serde(default)]
    pub log_join_products: bool,
}

#[cfg(test)]
mod tests {
    use super::FlowJoinConfig;

    #[test]
    fn test_runtime_defaults() {
        let cfg = FlowJoinConfig::parse(
            r#"
[runtime]
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.runtime.chunk_buffer_rows, 1024);
        assert_eq!(cfg.runtime.mem_limit_bytes, 0);
        assert_eq!(cfg.runtime.message_queue_capacity, 64);
        assert!(!cfg.debug.log_join_products);
    }

    #[test]
    fn test_runtime_can_be_overridden() {
        let cfg = FlowJoinConfig::parse(
            r#"
log_filter = "flowjoin=trace"

[runtime]
chunk_buffer_rows = 16
mem_limit_bytes = 1048576

[debug]
log_join_products = true
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.log_filter.as_deref(), Some("flowjoin=trace"));
        assert_eq!(cfg.runtime.chunk_buffer_rows, 16);
        assert_eq!(cfg.runtime.mem_limit_bytes, 1_048_576);
        assert!(cfg.debug.log_join_products);
    }

    #[test]
    fn test_zero_chunk_buffer_rows_is_rejected() {
        let err = FlowJoinConfig::parse(
            r#"
[runtime]
chunk_buffer_rows = 0
"#,
        )
        .expect_err("zero rows");
        assert!(format!("{err:#}").contains("chunk_buffer_rows must be greater than 0"));
    }
}
