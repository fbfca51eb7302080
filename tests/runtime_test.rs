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
//! Integration tests for the threaded join driver, output sinks and configuration.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flowjoin::{
    ChannelSink, ColumnType, Datum, GroupKey, InputMessage, JoinSide, MemTracker, MergeJoinDriver,
    MergeJoinOperatorFactory, MergeJoinOptions, ProjectionFn, RowEvaluator, SinkEvent, Status,
    StatusCode, flowjoin_config::FlowJoinConfig, run_streams,
};

use crate::common::{
    TableBuilder, TestConfig, group_key, key_stream, node, rows_of, run_messages, run_with_timeout,
    test_options,
};

mod common;

fn join_fn() -> Arc<dyn RowEvaluator> {
    Arc::new(
        ProjectionFn::new(vec![
            ProjectionFn::left("host", "host"),
            ProjectionFn::left("t", "t"),
            ProjectionFn::left("lv", "v"),
            ProjectionFn::right("rv", "v"),
        ])
        .expect("projection"),
    )
}

fn table(key: &GroupKey, ts: &[i64], base: i64) -> TableBuilder {
    ts.iter().enumerate().fold(
        TableBuilder::new(key.clone())
            .column("t", ColumnType::Int)
            .column("v", ColumnType::Int),
        |b, (i, t)| b.row(vec![Datum::Int(*t), Datum::Int(base + i as i64)]),
    )
}

fn side_messages(side: JoinSide, hosts: &[&str], ts: &[i64], base: i64) -> Vec<InputMessage> {
    let mut out = Vec::new();
    for host in hosts {
        let key = group_key(&[("host", host)]);
        out.extend(key_stream(side, &key, table(&key, ts, base).build_split(2)));
    }
    out.push(InputMessage::finish(side));
    out
}

fn factory(method: &str) -> MergeJoinOperatorFactory {
    MergeJoinOperatorFactory::new(node(&[("t", "t")], method), join_fn(), test_options())
}

#[test]
fn test_threaded_run_matches_direct_processing() {
    let hosts = ["a", "b", "c", "d"];
    let left = side_messages(JoinSide::Left, &hosts, &[1, 2, 2, 3, 5, 8], 0);
    let right = side_messages(JoinSide::Right, &hosts, &[2, 3, 3, 4, 8, 9], 100);

    let mut expected = left.clone();
    expected.extend(right.clone());
    let (direct, status) = run_messages(node(&[("t", "t")], "full"), join_fn(), expected, test_options());
    status.expect("direct join");

    let collected = flowjoin::CollectSink::new();
    let f = factory("full");
    let status = run_with_timeout(Duration::from_secs(30), move || {
        run_streams(&f, Box::new(collected.clone()), left, right).map(|_| collected)
    });
    let collected = status.expect("threaded join");
    assert!(collected.is_finished());
    assert_eq!(collected.error(), None);

    let cols = ["host", "t", "lv", "rv"];
    assert_eq!(rows_of(&collected.chunks(), &cols), rows_of(&direct.chunks(), &cols));
    assert_eq!(collected.total_rows(), direct.total_rows());
}

#[test]
fn test_join_inputs_can_be_cloned_across_threads() {
    let (sink, events) = ChannelSink::new(4);
    let driver = MergeJoinDriver::spawn_with_capacity(&factory("inner"), Box::new(sink), 2)
        .expect("spawn driver");
    assert_eq!(driver.name(), "MergeJoin (id=1)");

    let producers = [JoinSide::Left, JoinSide::Right].map(|side| {
        let input = driver.input(side);
        thread::spawn(move || {
            assert_eq!(input.side(), side);
            for host in ["x", "y"] {
                let key = group_key(&[("host", host)]);
                let base = if side.is_left() { 0 } else { 100 };
                for chunk in table(&key, &[1, 2, 3], base).build_split(1) {
                    input.send_chunk(chunk).expect("send chunk");
                }
                input.flush_key(key).expect("flush key");
            }
            input.finish(None).expect("finish side");
        })
    });

    let consumer = thread::spawn(move || {
        let mut rows = 0;
        let mut finish = None;
        for event in events {
            match event {
                SinkEvent::Chunk(chunk) => rows += chunk.len(),
                SinkEvent::Finish(error) => finish = Some(error),
            }
        }
        (rows, finish)
    });

    for producer in producers {
        producer.join().expect("producer thread");
    }
    driver.join().expect("driver status");
    let (rows, finish) = consumer.join().expect("consumer thread");
    assert_eq!(rows, 6);
    assert_eq!(finish, Some(None));
}

#[test]
fn test_driver_cancels_when_inputs_close_early() {
    let collected = flowjoin::CollectSink::new();
    let driver = MergeJoinDriver::spawn_with_capacity(
        &factory("left"),
        Box::new(collected.clone()),
        4,
    )
    .expect("spawn driver");
    {
        let left = driver.input(JoinSide::Left);
        let key = group_key(&[("host", "a")]);
        left.send_chunk(table(&key, &[1], 0).build()).expect("send");
        left.finish(None).expect("finish left");
    }
    let err = driver.join().expect_err("right side never finished");
    assert_eq!(err.code(), StatusCode::Cancelled);
    assert!(collected.is_finished());
    assert_eq!(collected.error().map(|e| e.code()), Some(StatusCode::Cancelled));
}

#[test]
fn test_send_on_wrong_side_is_rejected() {
    let collected = flowjoin::CollectSink::new();
    let driver = MergeJoinDriver::spawn_with_capacity(
        &factory("inner"),
        Box::new(collected.clone()),
        4,
    )
    .expect("spawn driver");
    let left = driver.input(JoinSide::Left);
    let err = left
        .send(InputMessage::finish(JoinSide::Right))
        .expect_err("wrong side");
    assert_eq!(err.code(), StatusCode::Internal);

    left.finish(None).expect("finish left");
    driver.input(JoinSide::Right).finish(None).expect("finish right");
    drop(left);
    driver.join().expect("both sides finished");
    assert!(collected.chunks().is_empty());
}

#[test]
fn test_upstream_failure_reaches_channel_sink() {
    let (sink, events) = ChannelSink::new(8);
    let upstream = Status::internal("upstream scan failed");
    let left = vec![InputMessage::fail(JoinSide::Left, upstream.clone())];
    let right = side_messages(JoinSide::Right, &["a"], &[1, 2], 100);
    let err = run_streams(&factory("inner"), Box::new(sink), left, right)
        .expect_err("terminal status carries the upstream error");
    assert_eq!(err, upstream);

    let events = events.into_iter().collect::<Vec<_>>();
    assert!(
        events.iter().all(|e| !matches!(e, SinkEvent::Chunk(_))),
        "no output after an upstream failure"
    );
    match events.last() {
        Some(SinkEvent::Finish(Some(err))) => assert_eq!(err, &upstream),
        other => panic!("unexpected final event {:?}", other),
    }
}

#[test]
fn test_dropped_output_receiver_cancels_join() {
    let (sink, events) = ChannelSink::new(1);
    drop(events);
    let left = side_messages(JoinSide::Left, &["a"], &[1, 2], 0);
    let right = side_messages(JoinSide::Right, &["a"], &[1, 2], 100);
    let err = run_streams(&factory("inner"), Box::new(sink), left, right)
        .expect_err("receiver dropped");
    assert_eq!(err.code(), StatusCode::Cancelled);
}

#[test]
fn test_transformation_tracker_is_child_of_configured_tracker() {
    let root = MemTracker::new_root("driver_root");
    let options = MergeJoinOptions::default()
        .with_chunk_buffer_rows(2)
        .with_mem_tracker(Arc::clone(&root));
    let left = side_messages(JoinSide::Left, &["a"], &[1, 1, 2], 0);
    let right = side_messages(JoinSide::Right, &["a"], &[1, 2, 2], 100);
    let mut messages = left;
    messages.extend(right);
    let (sink, status) = run_messages(node(&[("t", "t")], "inner"), join_fn(), messages, options);
    status.expect("join succeeds");
    assert_eq!(sink.total_rows(), 4);
    assert!(sink.chunks().iter().all(|c| c.len() <= 2));
    assert!(root.current() > 0);
    drop(sink);
    assert_eq!(root.current(), 0);
}

#[test]
fn test_config_file_values() {
    let test_config = TestConfig::with_content(
        r#"
log_level = "warn"
log_filter = "flowjoin=debug"

[runtime]
chunk_buffer_rows = 16
mem_limit_bytes = 1048576
message_queue_capacity = 4

[debug]
log_join_products = true
"#,
    )
    .expect("test config");
    let cfg = FlowJoinConfig::load_from_file(&test_config.config_path).expect("load config");
    assert_eq!(cfg.log_level, "warn");
    assert_eq!(cfg.log_filter.as_deref(), Some("flowjoin=debug"));
    assert_eq!(cfg.runtime.chunk_buffer_rows, 16);
    assert_eq!(cfg.runtime.mem_limit_bytes, 1_048_576);
    assert_eq!(cfg.runtime.message_queue_capacity, 4);
    assert!(cfg.debug.log_join_products);
}

#[test]
fn test_config_rejects_zero_chunk_rows() {
    let test_config = TestConfig::with_content("[runtime]\nchunk_buffer_rows = 0\n")
        .expect("test config");
    let err = FlowJoinConfig::load_from_file(&test_config.config_path).expect_err("invalid");
    assert!(
        format!("{err:#}").contains("chunk_buffer_rows must be greater than 0"),
        "err={err:#}"
    );
}

#[test]
fn test_global_config_drives_default_options() {
    let test_config = TestConfig::default();
    test_config.init_logging();
    let cfg = test_config.load_config().expect("global config");
    let options = MergeJoinOptions::from_config();
    assert_eq!(options.chunk_buffer_rows, cfg.runtime.chunk_buffer_rows);
    assert_eq!(options.log_join_products, cfg.debug.log_join_products);
    assert!(options.mem_tracker.is_none());
}
