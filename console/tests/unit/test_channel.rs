//! Transport channel tests against an in-memory connector

use std::time::Duration;

use tokio::time::Instant;

use servconsole::console::{encode, ControlKind, OutboundCommand};
use servconsole::transport::{
    ChannelEvent, ChannelHandle, ChannelIdentity, ChannelRegistry, ConnectionState, NotConnected,
    Options,
};

use crate::support::{log_frame, next_state, wait_for_state, FakeConnector};

fn identity() -> ChannelIdentity {
    ChannelIdentity::new("a1b2c3")
}

#[tokio::test]
async fn test_channel_opens_and_forwards_frames_in_order() {
    let (connector, mut remotes) = FakeConnector::new(true);
    let mut handle = ChannelHandle::spawn(identity(), connector, Options::default());
    let state_rx = handle.subscribe_state();

    assert_eq!(handle.state(), ConnectionState::Connecting);
    assert_eq!(next_state(&mut handle).await, ConnectionState::Connecting);
    assert_eq!(next_state(&mut handle).await, ConnectionState::Open);
    assert_eq!(handle.state(), ConnectionState::Open);
    assert_eq!(*state_rx.borrow(), ConnectionState::Open);

    let remote = remotes.recv().await.unwrap();
    for line in ["first", "second", "third"] {
        remote.push(&log_frame(line));
    }

    for line in ["first", "second", "third"] {
        assert_eq!(
            handle.recv().await,
            Some(ChannelEvent::Frame(log_frame(line)))
        );
    }
}

#[tokio::test]
async fn test_send_is_rejected_until_open() {
    let (connector, mut remotes) = FakeConnector::new(true);
    let mut handle = ChannelHandle::spawn(identity(), connector, Options::default());

    let command = OutboundCommand::ShellCommand { text: "ls".into() };
    assert_eq!(
        handle.send(&command),
        Err(NotConnected {
            state: ConnectionState::Connecting
        })
    );

    wait_for_state(&mut handle, ConnectionState::Open).await;
    let mut remote = remotes.recv().await.unwrap();

    let restart = OutboundCommand::ControlAction {
        kind: ControlKind::Restart,
    };
    handle.send(&restart).unwrap();
    handle.send(&command).unwrap();

    // The remote sees commands in call order, never the rejected one
    assert_eq!(remote.from_client.recv().await, Some(encode(&restart)));
    assert_eq!(remote.from_client.recv().await, Some(encode(&command)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_connects_retry_with_fixed_delay() {
    let (connector, _remotes) = FakeConnector::new(false);
    let start = Instant::now();
    let mut handle = ChannelHandle::spawn(identity(), connector.clone(), Options::default());

    // Connecting at t=0, then again after every fixed delay
    let mut connecting_at = Vec::new();
    while connecting_at.len() < 3 {
        if next_state(&mut handle).await == ConnectionState::Connecting {
            connecting_at.push(Instant::now() - start);
        }
    }

    for (n, elapsed) in connecting_at.iter().enumerate() {
        let expected = Duration::from_millis(3000 * n as u64);
        assert!(*elapsed >= expected, "attempt {} at {:?}", n, elapsed);
        assert!(
            *elapsed < expected + Duration::from_millis(100),
            "attempt {} at {:?}",
            n,
            elapsed
        );
    }

    let attempts = connector.attempts();
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(3000));
    }
}

#[tokio::test(start_paused = true)]
async fn test_remote_close_reconnects_after_delay() {
    let (connector, mut remotes) = FakeConnector::new(true);
    let mut handle = ChannelHandle::spawn(identity(), connector.clone(), Options::default());

    wait_for_state(&mut handle, ConnectionState::Open).await;
    let remote = remotes.recv().await.unwrap();

    let dropped_at = Instant::now();
    drop(remote);

    assert_eq!(next_state(&mut handle).await, ConnectionState::Disconnected);
    assert_eq!(next_state(&mut handle).await, ConnectionState::Connecting);
    let waited = Instant::now() - dropped_at;
    assert!(waited >= Duration::from_millis(3000), "reconnected after {:?}", waited);

    assert_eq!(next_state(&mut handle).await, ConnectionState::Open);
    let remote = remotes.recv().await.unwrap();
    remote.push(&log_frame("back"));
    assert_eq!(handle.recv().await, Some(ChannelEvent::Frame(log_frame("back"))));
    assert_eq!(connector.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_drop_then_failed_retry_reconnects_on_schedule() {
    let (connector, mut remotes) = FakeConnector::new(true);
    let mut handle = ChannelHandle::spawn(identity(), connector.clone(), Options::default());

    wait_for_state(&mut handle, ConnectionState::Open).await;
    let remote = remotes.recv().await.unwrap();

    // Remote drops at t0 and the first retry is refused
    connector.set_accept(false);
    let t0 = Instant::now();
    drop(remote);

    assert_eq!(next_state(&mut handle).await, ConnectionState::Disconnected);
    assert_eq!(Instant::now() - t0, Duration::ZERO);

    assert_eq!(next_state(&mut handle).await, ConnectionState::Connecting);
    let first_retry = Instant::now() - t0;
    assert!(first_retry >= Duration::from_millis(3000), "retry at {:?}", first_retry);
    assert!(first_retry < Duration::from_millis(3100), "retry at {:?}", first_retry);

    assert_eq!(next_state(&mut handle).await, ConnectionState::Disconnected);

    assert_eq!(next_state(&mut handle).await, ConnectionState::Connecting);
    let second_retry = Instant::now() - t0;
    assert!(second_retry >= Duration::from_millis(6000), "retry at {:?}", second_retry);
    assert!(second_retry < Duration::from_millis(6100), "retry at {:?}", second_retry);

    assert_eq!(connector.attempts().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_hung_connect_times_out_and_retries() {
    let (connector, _remotes) = FakeConnector::new(true);
    connector.set_hang(true);
    let start = Instant::now();
    let mut handle = ChannelHandle::spawn(identity(), connector.clone(), Options::default());

    assert_eq!(next_state(&mut handle).await, ConnectionState::Connecting);
    assert_eq!(next_state(&mut handle).await, ConnectionState::Disconnected);
    let gave_up = Instant::now() - start;
    assert!(gave_up >= Duration::from_secs(10), "gave up at {:?}", gave_up);
    assert!(gave_up < Duration::from_millis(10_100), "gave up at {:?}", gave_up);

    assert_eq!(next_state(&mut handle).await, ConnectionState::Connecting);
    let retried = Instant::now() - start;
    assert!(retried >= Duration::from_secs(13), "retry at {:?}", retried);
    assert!(retried < Duration::from_millis(13_100), "retry at {:?}", retried);
    assert_eq!(connector.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_consumer_drops_frames_and_reports_them() {
    let (connector, mut remotes) = FakeConnector::new(true);
    let options = Options {
        event_capacity: 16,
        ..Default::default()
    };
    let mut handle = ChannelHandle::spawn(identity(), connector, options);

    wait_for_state(&mut handle, ConnectionState::Open).await;
    let remote = remotes.recv().await.unwrap();

    // Nobody reads while the remote floods the channel
    for n in 0..1000 {
        remote.push(&log_frame(&format!("L{n}")));
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    for n in 0..16 {
        assert_eq!(
            handle.recv().await,
            Some(ChannelEvent::Frame(log_frame(&format!("L{n}"))))
        );
    }
    assert_eq!(handle.dropped_frames(), 984);

    // The gap is reported ahead of the next delivered frame
    remote.push(&log_frame("tail"));
    assert_eq!(handle.recv().await, Some(ChannelEvent::Dropped(984)));
    assert_eq!(handle.recv().await, Some(ChannelEvent::Frame(log_frame("tail"))));
    assert_eq!(handle.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_send_while_disconnected_fails() {
    let (connector, _remotes) = FakeConnector::new(false);
    let mut handle = ChannelHandle::spawn(identity(), connector, Options::default());

    wait_for_state(&mut handle, ConnectionState::Disconnected).await;

    let result = handle.send(&OutboundCommand::ShellCommand { text: "ls".into() });
    assert_eq!(
        result,
        Err(NotConnected {
            state: ConnectionState::Disconnected
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_reconnect() {
    let (connector, _remotes) = FakeConnector::new(false);
    let mut handle = ChannelHandle::spawn(identity(), connector.clone(), Options::default());

    wait_for_state(&mut handle, ConnectionState::Disconnected).await;
    handle.close();
    handle.close();

    connector.set_accept(true);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(connector.attempts().len(), 1);
    assert!(handle.is_closed());
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert_eq!(handle.recv().await, None);
}

#[tokio::test]
async fn test_close_stops_delivery() {
    let (connector, mut remotes) = FakeConnector::new(true);
    let mut handle = ChannelHandle::spawn(identity(), connector, Options::default());

    wait_for_state(&mut handle, ConnectionState::Open).await;
    let remote = remotes.recv().await.unwrap();

    remote.push(&log_frame("before close"));
    handle.close();
    let _ = remote.to_client.send(Ok(log_frame("after close")));

    assert_eq!(handle.recv().await, None);
    assert_eq!(
        handle.send(&OutboundCommand::ShellCommand { text: "ls".into() }),
        Err(NotConnected {
            state: ConnectionState::Disconnected
        })
    );
}

#[tokio::test]
async fn test_shutdown_closes_socket() {
    let (connector, mut remotes) = FakeConnector::new(true);
    let mut handle = ChannelHandle::spawn(identity(), connector, Options::default());

    wait_for_state(&mut handle, ConnectionState::Open).await;
    let mut remote = remotes.recv().await.unwrap();

    handle.shutdown(Duration::from_secs(1)).await;

    assert!(handle.is_closed());
    assert!(remote.to_client.is_closed());
    assert_eq!(remote.from_client.recv().await, None);

    // A second shutdown is a no-op
    handle.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_registry_supersedes_live_channel() {
    let (connector, mut remotes) = FakeConnector::new(true);
    let mut registry = ChannelRegistry::new(connector.clone(), Options::default());

    let mut first = registry.open(identity());
    wait_for_state(&mut first, ConnectionState::Open).await;
    let first_remote = remotes.recv().await.unwrap();

    let mut second = registry.open(identity());
    wait_for_state(&mut second, ConnectionState::Open).await;

    // The first worker closes its socket and reports offline
    let mut closing = Vec::new();
    while let Some(event) = first.recv().await {
        closing.push(event);
    }
    assert_eq!(
        closing,
        vec![
            ChannelEvent::State(ConnectionState::Closing),
            ChannelEvent::State(ConnectionState::Disconnected),
        ]
    );
    assert_eq!(first.state(), ConnectionState::Disconnected);
    assert!(first_remote.to_client.is_closed());
    assert_eq!(connector.closes(), 1);

    assert!(registry.is_live(&identity()));
    assert_eq!(registry.tracked(), 1);
    assert_eq!(second.state(), ConnectionState::Open);
    assert_eq!(connector.attempts().len(), 2);
}

#[tokio::test]
async fn test_registry_prunes_finished_channels() {
    let (connector, _remotes) = FakeConnector::new(true);
    let mut registry = ChannelRegistry::new(connector, Options::default());
    let other = ChannelIdentity::new("d4e5f6");

    let mut first = registry.open(identity());
    wait_for_state(&mut first, ConnectionState::Open).await;
    first.close();
    while registry.is_live(&identity()) {
        tokio::task::yield_now().await;
    }
    assert_eq!(registry.tracked(), 1);

    let _second = registry.open(other.clone());
    assert_eq!(registry.tracked(), 1);
    assert!(registry.is_live(&other));
    assert!(!registry.is_live(&identity()));
}
