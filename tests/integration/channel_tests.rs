//! End-to-end tests of the framed command channel: bytes in, `NodeService`,
//! bytes out.

use envnode::app::events::NodeEvent;
use envnode::rpc::codec::{FrameDecoder, encode_frame};
use envnode::rpc::dispatcher::{CommandDispatcher, PollOutcome};
use serde_json::Value;

use crate::mock_node::{FakeClock, InstrumentedTransport, LoopbackTransport, MemStore, RecordingSink, boot};

const BOOT_UNIX: u64 = 1_700_000_000;

fn framed(requests: &[&str]) -> LoopbackTransport {
    let mut t = LoopbackTransport::default();
    for r in requests {
        t.queue(&encode_frame(r.as_bytes()).unwrap());
    }
    t
}

fn replies(bytes: &[u8]) -> Vec<Value> {
    let mut decoder = FrameDecoder::new();
    let mut out = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let (used, frame) = decoder.feed(rest);
        if let Some(f) = frame {
            out.push(serde_json::from_slice(f).unwrap());
        }
        rest = &rest[used..];
    }
    out
}

#[test]
fn configure_and_query_over_the_channel() {
    let clock = FakeClock::starting_at(BOOT_UNIX);
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), InstrumentedTransport::answering(200), clock.now_ts(), &mut sink);
    clock.advance(90_000);

    let mut dispatcher = CommandDispatcher::new(framed(&[
        r#"{"cmd":"set_display_interval","arg":" 2.5 "}"#,
        r#"{"cmd":"set_server_interval","arg":"0.05"}"#,
        r#"{"cmd":"get_config"}"#,
    ]));
    assert_eq!(dispatcher.poll(&node, &clock, &mut sink), Ok(PollOutcome::Handled(3)));

    let r = replies(&dispatcher.transport().outbound);
    assert_eq!(r.len(), 3);
    assert_eq!(r[0]["status"], "ok");
    assert_eq!(r[1]["status"], "error");
    assert_eq!(r[1]["error_reason"], "out_of_range");
    assert_eq!(r[2]["boot_count"], 1);
    assert_eq!(r[2]["display_interval"]["current_value"], 2.5);
    assert_eq!(r[2]["display_interval"]["last_changed_source"], "Cloud/UI");
    assert_eq!(r[2]["display_interval"]["last_changed_unix"], BOOT_UNIX + 90);
    assert_eq!(r[2]["server_interval"]["last_changed_source"], "Boot");
}

#[test]
fn push_now_over_the_channel_reports_status() {
    let clock = FakeClock::starting_at(BOOT_UNIX);
    let transport = InstrumentedTransport::answering(200);
    transport.then(Ok(503));
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), transport, clock.now_ts(), &mut sink);

    let mut dispatcher = CommandDispatcher::new(framed(&[
        r#"{"cmd":"push_now"}"#,
        r#"{"cmd":"push_now"}"#,
        r#"{"cmd":"get_config"}"#,
    ]));
    assert_eq!(dispatcher.poll(&node, &clock, &mut sink), Ok(PollOutcome::Handled(3)));

    let r = replies(&dispatcher.transport().outbound);
    assert_eq!(r[0]["status"], "error");
    assert_eq!(r[0]["error_reason"], "send_failed");
    assert_eq!(r[0]["http_status"], 503);
    assert_eq!(r[1]["status"], "ok");
    assert_eq!(r[1]["http_status"], 200);
    assert_eq!(r[2]["send_success_count"], 1);
    assert_eq!(r[2]["send_fail_count"], 1);
    assert_eq!(sink.count(|e| matches!(e, NodeEvent::PushFailed { status: 503, .. })), 1);
}

#[test]
fn readings_over_the_channel() {
    let clock = FakeClock::starting_at(BOOT_UNIX);
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), InstrumentedTransport::answering(200), clock.now_ts(), &mut sink);
    clock.advance(1_000);

    let mut dispatcher = CommandDispatcher::new(framed(&[r#"{"cmd":"get_readings"}"#]));
    assert_eq!(dispatcher.poll(&node, &clock, &mut sink), Ok(PollOutcome::Handled(1)));

    let r = replies(&dispatcher.transport().outbound);
    assert_eq!(r[0]["status"], "ok");
    assert_eq!(r[0]["sample_id"], 1);
    assert_eq!(r[0]["device_id"], "EN-0A0B0C");
    assert_eq!(r[0]["unix_ts"], BOOT_UNIX + 1);
    assert_eq!(r[0]["iso_time"], "2023-11-14T22:13:21Z");
    assert_eq!(r[0]["server_interval"], 5.0);
    assert_eq!(r[0]["display_interval"], 1.0);
    assert_eq!(node.latest_snapshot().map(|s| s.sample_id), Some(1));
}

#[test]
fn soft_reset_stops_the_batch_without_reply() {
    let clock = FakeClock::starting_at(BOOT_UNIX);
    let mut sink = RecordingSink::new();
    let node = boot(MemStore::new(), InstrumentedTransport::answering(200), clock.now_ts(), &mut sink);

    let mut dispatcher = CommandDispatcher::new(framed(&[
        r#"{"cmd":"get_config"}"#,
        r#"{"cmd":"soft_reset"}"#,
        r#"{"cmd":"get_config"}"#,
    ]));
    assert_eq!(dispatcher.poll(&node, &clock, &mut sink), Ok(PollOutcome::Restart));
    assert_eq!(replies(&dispatcher.transport().outbound).len(), 1);
}
