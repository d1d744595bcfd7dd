//! Integration tests for `NodeService` with mock adapters.
//!
//! Covers boot, remote configuration, scheduled and on-demand pushes, and
//! the concurrency guarantees between the tick loop and the command thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use envnode::app::commands::{CommandResponse, Dispatch, NodeCommand};
use envnode::app::events::NodeEvent;
use envnode::app::ports::{BusError, TransportError};
use envnode::params::{ChangeSource, ParameterId};
use envnode::rpc::dispatcher::handle_request;
use envnode::timestamp::Timestamp;

use crate::mock_node::{
    InstrumentedTransport, MemStore, RecordingSink, ScriptedReader, TestNode, boot, boot_with_reader,
};

const T0: Timestamp = Timestamp::from_unix_secs(1_700_000_000);

fn at(offset_secs: u64) -> Timestamp {
    Timestamp::from_unix_secs(T0.as_unix_secs() + offset_secs)
}

fn respond(node: &TestNode, cmd: NodeCommand, now: Timestamp, sink: &mut RecordingSink) -> CommandResponse {
    match node.handle_command(cmd, now, sink) {
        Dispatch::Respond(r) => r,
        Dispatch::Restart => panic!("unexpected restart"),
    }
}

fn set(node: &TestNode, id: ParameterId, arg: &str, now: Timestamp, sink: &mut RecordingSink) -> CommandResponse {
    let name = match id {
        ParameterId::DisplayInterval => "set_display_interval",
        ParameterId::ServerInterval => "set_server_interval",
    };
    respond(node, NodeCommand::parse(name, Some(arg)).unwrap(), now, sink)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn fresh_boot_reports_defaults() {
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), InstrumentedTransport::answering(200), T0, &mut sink);

    let report = match respond(&node, NodeCommand::GetConfig, at(1), &mut sink) {
        CommandResponse::Config(c) => c,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(report.status, "ok");
    assert_eq!(report.device_id.as_str(), "EN-0A0B0C");
    assert_eq!(report.firmware_version, "1.2.3");
    assert_eq!(report.boot_count, 1);
    assert_eq!(report.send_success_count, 0);
    assert_eq!(report.send_fail_count, 0);
    assert_eq!(report.display_interval.current_value, 1.0);
    assert_eq!(report.display_interval.last_changed_source, "Boot");
    assert_eq!(report.display_interval.last_changed_unix, T0.as_unix_secs());
    assert_eq!(report.server_interval.current_value, 5.0);
    assert_eq!(report.server_interval.last_changed_source, "Boot");
}

#[test]
fn boot_count_survives_reboots() {
    let store = MemStore::new();
    for expected in 1..=3 {
        let mut sink = RecordingSink::new();
        let node = boot(store.clone(), InstrumentedTransport::answering(200), T0, &mut sink);
        assert_eq!(node.tracker().boot_count(), expected);
        assert!(matches!(
            sink.events.as_slice(),
            [NodeEvent::Booted { boot_count }] if *boot_count == expected
        ));
    }
}

#[test]
fn unwritable_store_still_boots() {
    let store = MemStore::new();
    store.set_fail_writes(true);
    let mut sink = RecordingSink::new();
    let node = boot(store, InstrumentedTransport::answering(200), T0, &mut sink);

    assert_eq!(node.tracker().boot_count(), 1);
    assert!(matches!(
        sink.events.as_slice(),
        [NodeEvent::PersistFailed, NodeEvent::Booted { boot_count: 1 }]
    ));
}

// ── Remote configuration ──────────────────────────────────────

#[test]
fn out_of_range_interval_is_rejected_without_side_effects() {
    let store = MemStore::new();
    let mut sink = RecordingSink::new();
    let node = boot(store.clone(), InstrumentedTransport::answering(200), T0, &mut sink);
    let writes = store.writes();

    for arg in ["0.05", "60.5", "-1", "NaN", "inf"] {
        match set(&node, ParameterId::DisplayInterval, arg, at(10), &mut sink) {
            CommandResponse::Action(a) => {
                assert_eq!(a.status, "error", "{arg}");
                assert_eq!(a.error_reason, "out_of_range", "{arg}");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    let p = node.tracker().get(ParameterId::DisplayInterval);
    assert_eq!(p.current_value, 1.0);
    assert_eq!(p.last_changed_source, ChangeSource::InitialLoad);
    assert_eq!(store.writes(), writes);
}

#[test]
fn long_arguments_are_range_checked_in_full() {
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), InstrumentedTransport::answering(200), T0, &mut sink);

    // 5000 minutes written out long: must not be read as its leading "5.0...".
    match set(&node, ParameterId::ServerInterval, "5.0000000000000000000000000000000e3", at(10), &mut sink) {
        CommandResponse::Action(a) => assert_eq!(a.error_reason, "out_of_range"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(node.tracker().value(ParameterId::ServerInterval), 5.0);
    assert_eq!(
        node.tracker().get(ParameterId::ServerInterval).last_changed_source,
        ChangeSource::InitialLoad
    );

    // Zero-padded 0.5 is a valid interval.
    match set(&node, ParameterId::ServerInterval, "0000000000000000000000000000000.5", at(11), &mut sink) {
        CommandResponse::Action(a) => assert_eq!(a.status, "ok"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(node.tracker().value(ParameterId::ServerInterval), 0.5);
}

#[test]
fn accepted_interval_is_tracked_and_persisted() {
    let store = MemStore::new();
    let mut sink = RecordingSink::new();
    let node = boot(store.clone(), InstrumentedTransport::answering(200), T0, &mut sink);

    match set(&node, ParameterId::DisplayInterval, "2.5", at(30), &mut sink) {
        CommandResponse::Action(a) => {
            assert_eq!(a.status, "ok");
            assert_eq!(a.error_reason, "");
        }
        other => panic!("unexpected {:?}", other),
    }
    let p = node.tracker().get(ParameterId::DisplayInterval);
    assert_eq!(p.current_value, 2.5);
    assert_eq!(p.last_changed_source.as_str(), "Cloud/UI");
    assert_eq!(p.last_changed_at, at(30));
    assert!(sink.events.iter().any(|e| matches!(
        e,
        NodeEvent::IntervalChanged {
            parameter: ParameterId::DisplayInterval,
            source: ChangeSource::RemoteCommand,
            ..
        }
    )));

    // The next boot reads the new value back from storage.
    drop(node);
    let mut sink = RecordingSink::new();
    let node = boot(store, InstrumentedTransport::answering(200), at(100), &mut sink);
    let p = node.tracker().get(ParameterId::DisplayInterval);
    assert_eq!(p.current_value, 2.5);
    assert_eq!(p.last_changed_source, ChangeSource::InitialLoad);
    assert_eq!(node.tracker().value(ParameterId::ServerInterval), 5.0);
    assert_eq!(node.tracker().boot_count(), 2);
}

#[test]
fn setting_the_same_value_changes_nothing() {
    let store = MemStore::new();
    let mut sink = RecordingSink::new();
    let node = boot(store.clone(), InstrumentedTransport::answering(200), T0, &mut sink);
    let writes = store.writes();

    match set(&node, ParameterId::ServerInterval, "5.00001", at(50), &mut sink) {
        CommandResponse::Action(a) => assert_eq!(a.status, "ok"),
        other => panic!("unexpected {:?}", other),
    }
    let p = node.tracker().get(ParameterId::ServerInterval);
    assert_eq!(p.current_value, 5.0);
    assert_eq!(p.last_changed_at, T0);
    assert_eq!(p.last_changed_source, ChangeSource::InitialLoad);
    assert_eq!(store.writes(), writes);
    assert_eq!(sink.count(|e| matches!(e, NodeEvent::IntervalChanged { .. })), 0);
}

#[test]
fn change_timestamp_never_goes_backwards() {
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), InstrumentedTransport::answering(200), T0, &mut sink);

    set(&node, ParameterId::ServerInterval, "10", at(2_000), &mut sink);
    // Wall clock stepped back (e.g. an SNTP correction).
    set(&node, ParameterId::ServerInterval, "12", at(1_000), &mut sink);

    let p = node.tracker().get(ParameterId::ServerInterval);
    assert_eq!(p.current_value, 12.0);
    assert_eq!(p.last_changed_at, at(2_000));
}

#[test]
fn persist_failure_keeps_the_new_value_running() {
    let store = MemStore::new();
    let mut sink = RecordingSink::new();
    let node = boot(store.clone(), InstrumentedTransport::answering(200), T0, &mut sink);
    store.set_fail_writes(true);

    match set(&node, ParameterId::DisplayInterval, "3", at(5), &mut sink) {
        CommandResponse::Action(a) => assert_eq!(a.status, "ok"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(node.tracker().value(ParameterId::DisplayInterval), 3.0);
    assert!(matches!(sink.events.last(), Some(NodeEvent::PersistFailed)));
}

// ── Pushes ────────────────────────────────────────────────────

#[test]
fn push_now_sends_identity_and_readings() {
    let transport = InstrumentedTransport::answering(200);
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), transport.clone(), T0, &mut sink);

    match respond(&node, NodeCommand::PushNow, at(42), &mut sink) {
        CommandResponse::Action(a) => {
            assert_eq!(a.status, "ok");
            assert_eq!(a.http_status, Some(200));
        }
        other => panic!("unexpected {:?}", other),
    }

    let body = transport.last_body_json();
    assert_eq!(body["device_id"], "EN-0A0B0C");
    assert_eq!(body["firmware_version"], "1.2.3");
    assert_eq!(body["unix_timestamp"], at(42).as_unix_secs());
    assert!(approx(body["humidity"].as_f64().unwrap(), 45.0));
    assert!(approx(body["temperature"].as_f64().unwrap(), 21.5));

    let posts = transport.posts.lock().unwrap();
    assert!(posts[0].headers.contains(&("X-Api-Key".to_owned(), "s3cret".to_owned())));
    assert_eq!(node.counters().success, 1);
}

#[test]
fn push_now_reports_server_rejection_and_unreachable() {
    let transport = InstrumentedTransport::answering(200);
    transport.then(Ok(503));
    transport.then(Err(TransportError::Timeout));
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), transport, T0, &mut sink);

    match respond(&node, NodeCommand::PushNow, at(1), &mut sink) {
        CommandResponse::Action(a) => {
            assert_eq!(a.status, "error");
            assert_eq!(a.error_reason, "send_failed");
            assert_eq!(a.http_status, Some(503));
        }
        other => panic!("unexpected {:?}", other),
    }
    match respond(&node, NodeCommand::PushNow, at(2), &mut sink) {
        CommandResponse::Action(a) => {
            assert_eq!(a.status, "error");
            assert_eq!(a.http_status, Some(0));
        }
        other => panic!("unexpected {:?}", other),
    }

    let counters = node.counters();
    assert_eq!(counters.success, 0);
    assert_eq!(counters.failed, 2);
    assert_eq!(
        sink.count(|e| matches!(e, NodeEvent::PushFailed { reason: "unreachable", status: 0, .. })),
        1
    );
}

#[test]
fn failed_channel_is_pushed_as_sentinel() {
    let transport = InstrumentedTransport::answering(200);
    let reader = ScriptedReader::healthy();
    reader.set(1, Err(BusError::Corrupted));
    let mut sink = RecordingSink::new();
    let node = boot_with_reader(reader, MemStore::new(), transport.clone(), T0, &mut sink);

    match respond(&node, NodeCommand::GetReadings, at(3), &mut sink) {
        CommandResponse::Readings(r) => {
            let t = r.values.iter().find(|v| v.name == "temperature").unwrap();
            assert!(!t.valid);
            assert_eq!(t.value, -1.0);
            let h = r.values.iter().find(|v| v.name == "humidity").unwrap();
            assert!(h.valid);
        }
        other => panic!("unexpected {:?}", other),
    }

    respond(&node, NodeCommand::PushNow, at(4), &mut sink);
    assert_eq!(transport.last_body_json()["temperature"], -1.0);
    assert_eq!(node.counters().success, 1);
}

// ── Scheduling ────────────────────────────────────────────────

#[test]
fn tick_loop_samples_and_pushes_on_their_intervals() {
    let transport = InstrumentedTransport::answering(200);
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), transport.clone(), T0, &mut sink);

    // Five minutes of 500 ms ticks at the default 1 min / 5 min intervals.
    for uptime in (0..=300_000u64).step_by(500) {
        node.run_tick(uptime, at(uptime / 1_000), &mut sink);
        node.run_pending_push(&mut sink);
    }

    assert_eq!(sink.sampled_ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(transport.post_count(), 1);
    // The push at 5 min reuses that tick's sample.
    assert!(matches!(
        sink.events.last(),
        Some(NodeEvent::PushSucceeded { sample_id: 5, status: 200 })
    ));
}

#[test]
fn interval_change_applies_from_the_next_tick() {
    let transport = InstrumentedTransport::answering(200);
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), transport.clone(), T0, &mut sink);

    set(&node, ParameterId::ServerInterval, "0.5", at(0), &mut sink);
    for uptime in (0..=60_000u64).step_by(500) {
        node.run_tick(uptime, at(uptime / 1_000), &mut sink);
        node.run_pending_push(&mut sink);
    }
    assert_eq!(transport.post_count(), 2);
}

#[test]
fn slow_pushes_do_not_hold_up_the_tick_loop() {
    let latency = Duration::from_millis(300);
    let transport = InstrumentedTransport::answering(200).with_latency(latency);
    let mut sink = RecordingSink::new();
    let node = Arc::new(boot(MemStore::new(), transport.clone(), T0, &mut sink));
    set(&node, ParameterId::DisplayInterval, "0.1", at(0), &mut sink);
    set(&node, ParameterId::ServerInterval, "0.1", at(0), &mut sink);

    let stop = Arc::new(AtomicBool::new(false));
    let worker = {
        let node = Arc::clone(&node);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut sink = RecordingSink::new();
            while !stop.load(Ordering::SeqCst) {
                if node.run_pending_push(&mut sink).is_none() {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            while node.run_pending_push(&mut sink).is_some() {}
            sink
        })
    };

    // 30 s of 500 ms ticks: a sample and a push every 6 s.
    for uptime in (0..=30_000u64).step_by(500) {
        let started = Instant::now();
        node.run_tick(uptime, at(uptime / 1_000), &mut sink);
        assert!(started.elapsed() < latency / 2, "tick at {uptime} ms waited on a push");
        if uptime % 6_000 == 0 && uptime > 0 {
            // Give the worker time to start the slow post.
            thread::sleep(Duration::from_millis(20));
        }
    }
    stop.store(true, Ordering::SeqCst);
    let worker_sink = worker.join().unwrap();

    assert_eq!(sink.sampled_ids(), vec![1, 2, 3, 4, 5]);
    assert!(transport.post_count() >= 1);
    // The newest snapshot is always the one that ends up sent.
    assert!(matches!(
        worker_sink.events.last(),
        Some(NodeEvent::PushSucceeded { sample_id: 5, status: 200 })
    ));
}

// ── Concurrency ───────────────────────────────────────────────

#[test]
fn concurrent_pushes_never_overlap() {
    let transport = InstrumentedTransport::answering(200).with_latency(Duration::from_millis(10));
    let mut sink = RecordingSink::new();
    let node = Arc::new(boot(MemStore::new(), transport.clone(), T0, &mut sink));
    // 0.1 min: every tick below is a push tick.
    set(&node, ParameterId::ServerInterval, "0.1", at(0), &mut sink);

    let remote = {
        let node = Arc::clone(&node);
        thread::spawn(move || {
            let mut sink = RecordingSink::new();
            for i in 0..8 {
                node.push_now(at(i), &mut sink);
            }
        })
    };
    for k in 1..=8u64 {
        node.run_tick(k * 6_000, at(k * 6), &mut sink);
        assert!(node.run_pending_push(&mut sink).is_some());
    }
    remote.join().unwrap();

    let posts = transport.posts.lock().unwrap();
    assert_eq!(posts.len(), 16);
    for pair in posts.windows(2) {
        assert!(
            pair[0].finished <= pair[1].started,
            "push windows overlap: {:?} vs {:?}",
            pair[0],
            pair[1]
        );
    }
    assert_eq!(node.counters().success, 16);
}

#[test]
fn sample_ids_are_unique_and_increasing_across_threads() {
    let mut sink = RecordingSink::new();
    let node = Arc::new(boot(MemStore::new(), InstrumentedTransport::answering(200), T0, &mut sink));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let node = Arc::clone(&node);
            thread::spawn(move || {
                let mut sink = RecordingSink::new();
                let mut ids = Vec::new();
                for _ in 0..25 {
                    match node.handle_command(NodeCommand::GetReadings, T0, &mut sink) {
                        Dispatch::Respond(CommandResponse::Readings(r)) => ids.push(r.sample_id),
                        other => panic!("unexpected {:?}", other),
                    }
                }
                ids
            })
        })
        .collect();

    let mut all = Vec::new();
    for h in handles {
        let ids = h.join().unwrap();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "per-thread ids not increasing");
        all.extend(ids);
    }
    all.sort_unstable();
    assert_eq!(all, (1..=100).collect::<Vec<u64>>());
}

#[test]
fn remote_setter_races_with_tick_loop() {
    let mut sink = RecordingSink::new();
    let node = Arc::new(boot(MemStore::new(), InstrumentedTransport::answering(200), T0, &mut sink));

    let setter = {
        let node = Arc::clone(&node);
        thread::spawn(move || {
            let mut sink = RecordingSink::new();
            for i in 1..=50u64 {
                let value = format!("{}", 1 + i % 10);
                set(&node, ParameterId::DisplayInterval, &value, at(i), &mut sink);
            }
        })
    };
    for uptime in (0..200_000u64).step_by(500) {
        node.run_tick(uptime, at(uptime / 1_000), &mut sink);
    }
    setter.join().unwrap();

    let p = node.tracker().get(ParameterId::DisplayInterval);
    assert!((1.0..=10.0).contains(&p.current_value));
    assert_eq!(p.last_changed_source, ChangeSource::RemoteCommand);
    assert_eq!(node.tracker().persisted_snapshot().display_interval, p.current_value);
}

// ── Request decoding ──────────────────────────────────────────

#[test]
fn json_requests_drive_the_service() {
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), InstrumentedTransport::answering(200), T0, &mut sink);

    let reply = |payload: &str, sink: &mut RecordingSink| match handle_request(payload.as_bytes(), &node, at(9), sink) {
        Dispatch::Respond(r) => serde_json::to_value(&r).unwrap(),
        Dispatch::Restart => serde_json::Value::Null,
    };

    let v = reply(r#"{"cmd":"set_server_interval","arg":15}"#, &mut sink);
    assert_eq!(v["status"], "ok");
    let v = reply(r#"{"cmd":"get_config"}"#, &mut sink);
    assert_eq!(v["server_interval"]["current_value"], 15.0);
    assert_eq!(v["server_interval"]["last_changed_source"], "Cloud/UI");
    let v = reply(r#"{"cmd":"set_display_interval","arg":"soon"}"#, &mut sink);
    assert_eq!(v["error_reason"], "invalid_argument");
    let v = reply(r#"{"cmd":"reboot"}"#, &mut sink);
    assert_eq!(v["error_reason"], "unknown_command");
    assert_eq!(reply(r#"{"cmd":"soft_reset"}"#, &mut sink), serde_json::Value::Null);
}
