//! Decode and route scenarios, no transport involved

use servconsole::console::{
    decode, ConsoleState, ConsoleSurface, ConsoleView, InboundEvent, LogStream, Routed, Router,
    TerminalSurface,
};
use servconsole::transport::{ChannelIdentity, ConnectionState};

use crate::support::{log_frame, RecordingSurface};

fn feed(
    router: &mut Router,
    state: &mut ConsoleState,
    surface: &mut RecordingSurface,
    raw: &str,
) -> Vec<Routed> {
    decode(raw)
        .into_iter()
        .map(|event| router.dispatch(event, state, surface))
        .collect()
}

#[test]
fn test_rolling_log_keeps_newest_thousand() {
    let mut router = Router::new();
    let mut state = ConsoleState::default();
    let mut surface = RecordingSurface::default();

    for n in 0..1200 {
        feed(&mut router, &mut state, &mut surface, &log_frame(&format!("L{n}")));
    }

    let lines: Vec<&str> = state.logs.snapshot().map(|entry| entry.text.as_str()).collect();
    assert_eq!(lines.len(), 1000);
    assert_eq!(lines.first(), Some(&"L200"));
    assert_eq!(lines.last(), Some(&"L1199"));

    // Ids keep counting across evictions
    let ids: Vec<u64> = state.logs.snapshot().map(|entry| entry.id).collect();
    assert!(ids.windows(2).all(|pair| pair[1] == pair[0] + 1));
    assert_eq!(ids.first(), Some(&200));
    assert_eq!(router.stats().lines, 1200);
}

#[test]
fn test_status_frame_updates_metrics_and_status() {
    let mut router = Router::new();
    let mut state = ConsoleState::default();
    let mut surface = RecordingSurface::default();
    let frame = r#"{"type":"status-data","data":{"cpu":{"used":"12.5"},"memory":{"used":"300","max":"1024"},"info":{"status":"running","ip":"10.0.0.5"}}}"#;

    let routed = feed(&mut router, &mut state, &mut surface, frame);
    assert_eq!(routed, vec![Routed::Metrics, Routed::Status { changed: true }]);

    let latest = state.metrics.latest().unwrap();
    assert_eq!(latest.cpu_percent, 12.5);
    assert_eq!(latest.memory_used_mb, 300.0);
    assert_eq!(latest.memory_max_mb, 1024.0);
    assert_eq!(state.metrics.history_len(), 1);

    let status = state.status.as_ref().unwrap();
    assert!(status.running);
    assert_eq!(status.address, "10.0.0.5");
    assert_eq!(surface.statuses.len(), 1);

    // Same status again: one more sample, no new status notification
    let routed = feed(&mut router, &mut state, &mut surface, frame);
    assert_eq!(routed, vec![Routed::Metrics, Routed::Status { changed: false }]);
    assert_eq!(state.metrics.history_len(), 2);
    assert_eq!(surface.statuses.len(), 1);
}

#[test]
fn test_unknown_frame_changes_nothing() {
    let mut router = Router::new();
    let mut state = ConsoleState::default();
    let mut surface = RecordingSurface::default();
    feed(&mut router, &mut state, &mut surface, &log_frame("kept"));

    let events = decode(r#"{"type":"unknown-thing"}"#);
    assert_eq!(
        events,
        vec![InboundEvent::Malformed {
            raw: r#"{"type":"unknown-thing"}"#.to_string()
        }]
    );

    let routed = feed(&mut router, &mut state, &mut surface, r#"{"type":"unknown-thing"}"#);
    assert_eq!(routed, vec![Routed::Diagnostic]);
    assert_eq!(surface.diagnostics, vec![r#"{"type":"unknown-thing"}"#.to_string()]);
    assert_eq!(state.logs.len(), 1);
    assert!(state.metrics.latest().is_none());
    assert!(state.status.is_none());
}

#[test]
fn test_out_of_order_sequence_is_kept_in_arrival_order() {
    let mut router = Router::new();
    let mut state = ConsoleState::default();
    let mut surface = RecordingSurface::default();

    feed(&mut router, &mut state, &mut surface, r#"{"type":"log-data","line":"b","sequence":2}"#);
    feed(&mut router, &mut state, &mut surface, r#"{"type":"log-data","line":"a","sequence":1,"stream":"stderr"}"#);
    feed(&mut router, &mut state, &mut surface, r#"{"type":"log-data","line":""}"#);

    let entries: Vec<_> = state.logs.snapshot().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "b");
    assert_eq!(entries[1].text, "a");
    assert_eq!(entries[1].stream, LogStream::Stderr);
    assert_eq!(router.stats().ignored, 1);
}

#[test]
fn test_terminal_prints_diagnostics_in_arrival_order() {
    colored::control::set_override(false);
    let mut router = Router::new();
    let mut state = ConsoleState::default();
    let mut terminal = TerminalSurface::new(Vec::new());

    for raw in [log_frame("a").as_str(), "garbage", log_frame("b").as_str()] {
        for event in decode(raw) {
            router.dispatch(event, &mut state, &mut terminal);
        }
    }

    let identity = ChannelIdentity::new("srv");
    terminal.paint(&ConsoleView {
        identity: &identity,
        connection: ConnectionState::Open,
        status: state.status.as_ref(),
        logs: &state.logs,
        metrics: &state.metrics,
    });

    let out = String::from_utf8(terminal.into_inner()).unwrap();
    assert_eq!(out, "a\n[unparsed] garbage\nb\n");
}
