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
//! Process-wide tracing setup with glog-style line prefixes.
//!
//! Output goes to `$FLOWJOIN_LOG_FILE`, else `$FLOWJOIN_LOG_DIR/flowjoin.log`,
//! else stderr. Initialization runs once; later calls are no-ops.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt};

static INIT: OnceLock<()> = OnceLock::new();

/// `Lyyyymmdd hh:mm:ss.uuuuuu thread file:line] message`
struct GlogFormatter;

impl<S, N> FormatEvent<S, N> for GlogFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let level = match *metadata.level() {
            tracing::Level::ERROR => 'E',
            tracing::Level::WARN => 'W',
            tracing::Level::INFO => 'I',
            tracing::Level::DEBUG => 'D',
            tracing::Level::TRACE => 'T',
        };
        let current = std::thread::current();
        let thread = current.name().unwrap_or("-");
        write!(
            writer,
            "{}{} {} {}:{}] ",
            level,
            Local::now().format("%Y%m%d %H:%M:%S%.6f"),
            thread,
            metadata.file().unwrap_or("unknown"),
            metadata.line().unwrap_or(0)
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn log_file_from_env() -> Option<PathBuf> {
    let non_empty = |var: &str| {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    non_empty("FLOWJOIN_LOG_FILE")
        .map(PathBuf::from)
        .or_else(|| non_empty("FLOWJOIN_LOG_DIR").map(|dir| Path::new(&dir).join("flowjoin.log")))
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. `filter` is a bare level or a full `EnvFilter`
/// expression such as `flowjoin=debug,flowjoin::runtime=trace`.
pub fn init_with_level(filter: &str) {
    INIT.get_or_init(|| {
        let (writer, ansi) = match log_file_from_env().map(|p| (open_append(&p), p)) {
            Some((Ok(file), _)) => (BoxMakeWriter::new(Mutex::new(file)), false),
            Some((Err(err), path)) => {
                eprintln!(
                    "failed to open log file {}: {}, logging to stderr",
                    path.display(),
                    err
                );
                (BoxMakeWriter::new(std::io::stderr), atty::is(atty::Stream::Stderr))
            }
            None => (BoxMakeWriter::new(std::io::stderr), atty::is(atty::Stream::Stderr)),
        };
        let _ = tracing_fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(writer)
            .with_ansi(ansi)
            .event_format(GlogFormatter)
            .try_init();
    });
}

pub fn init() {
    init_with_level("info");
}

/// Initialize from `flowjoin.toml`: `log_filter` wins over `log_level`; without a
/// config file the level is `info`.
pub fn init_from_config() {
    let filter = crate::flowjoin_config::config()
        .ok()
        .map(|c| c.log_filter.clone().unwrap_or_else(|| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_with_level(&filter);
}

pub use tracing::{debug, error, info, trace, warn};
