//! Connection lifecycle: path and identity waits, HELLO retries, WELCOME
//! readiness and close semantics. Time is paused so retries and timeouts
//! run instantly.

mod common;

use std::time::Duration;

use common::{HUB_IDENTITY, Harness, announcement, hub_frame, welcome};
use rrc_client::testing::{MockTransfer, MockTransport};
use rrc_client::{ClientConfig, ClientError, HandshakeState, TransportError};
use rrc_core::{HelloBody, MessageType, ResourceKind};
use tokio::time::{Instant, sleep};

fn config() -> ClientConfig {
    ClientConfig::default()
}

#[tokio::test(start_paused = true)]
async fn connect_without_wait_opens_session() {
    let h = Harness::new(config());
    assert_eq!(h.client.state(), HandshakeState::Idle);

    h.client
        .connect(h.hub, false, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(h.transport.sessions_opened(), 1);
    assert_eq!(h.transport.path_requests(), vec![h.hub]);
    assert!(h.client.is_connected());
    assert!(!h.client.is_ready());
    assert_eq!(h.client.hub(), Some(h.hub));
    assert_eq!(h.client.state(), HandshakeState::SessionPending);
}

#[tokio::test(start_paused = true)]
async fn connect_str_parses_hex() {
    let h = Harness::new(config());
    let text = format!("  0x{}\n", h.hub);
    h.client
        .connect_str(&text, false, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(h.client.hub(), Some(h.hub));
}

#[tokio::test(start_paused = true)]
async fn connect_str_rejects_bad_hash() {
    let h = Harness::new(config());
    for bad in ["zz", "abcd", ""] {
        let err = h
            .client
            .connect_str(bad, false, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)), "{bad:?}: {err}");
    }
    assert_eq!(h.transport.sessions_opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_times_out_when_identity_unknown() {
    let h = Harness::new(config());
    let unknown = rrc_core::DestinationHash::new([0x55; 16]);
    let start = Instant::now();

    let err = h
        .client
        .connect(unknown, true, Duration::from_secs(2))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Timeout(_)), "got {err}");
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(h.client.state(), HandshakeState::Failed);
    assert_eq!(h.transport.sessions_opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_rejects_destination_of_another_name() {
    let transport = MockTransport::new();
    let other = transport.add_hub("rrc.elsewhere", HUB_IDENTITY);
    let h = Harness::with_transport(config(), transport);

    let err = h
        .client
        .connect(other, false, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidInput(_)), "got {err}");
    assert_eq!(h.client.state(), HandshakeState::Failed);
    assert_eq!(h.transport.sessions_opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn existing_session_is_torn_down_before_opening() {
    let h = Harness::new(config());
    h.transport.add_existing_session(h.hub);
    let start = Instant::now();

    h.client
        .connect(h.hub, false, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(h.transport.teardown_requests(), vec![h.hub]);
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(h.transport.sessions_opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn open_failure_is_a_transport_error() {
    let h = Harness::new(config());
    h.transport.fail_open("no route");

    let err = h
        .client
        .connect(h.hub, false, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(TransportError::OpenFailed(_))
    ));
    assert_eq!(h.client.state(), HandshakeState::Failed);
    assert!(!h.client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn established_session_identifies_and_sends_hello() {
    let mut cfg = config();
    cfg.hello_name = "rrc-test".into();
    cfg.hello_version = "2.0".into();
    cfg.nickname = Some("alice".into());
    let h = Harness::connected(cfg).await;

    assert!(h.session().was_identified());
    assert_eq!(h.client.state(), HandshakeState::HelloRetry);

    let hellos = h.sent_of(MessageType::Hello);
    assert_eq!(hellos.len(), 1);
    let hello = &hellos[0];
    assert_eq!(hello.src, common::CLIENT_IDENTITY.to_vec());
    assert_eq!(hello.nick.as_deref(), Some("alice"));
    let expected = HelloBody::new("rrc-test", "2.0").to_value();
    assert_eq!(hello.body.as_ref(), Some(&expected));
}

#[tokio::test(start_paused = true)]
async fn hello_retries_stop_at_connect_deadline() {
    // Connected with a 5 s budget: attempts at 0 s and 3 s, none at 6 s.
    let h = Harness::connected(config()).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 1);

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 2);

    sleep(Duration::from_millis(3_000)).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 2);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn short_timeout_allows_a_single_hello() {
    let h = Harness::new(config());
    h.client
        .connect(h.hub, false, Duration::from_secs(2))
        .await
        .unwrap();
    h.handler().on_established();

    sleep(Duration::from_secs(30)).await;

    assert!(h.session().was_identified());
    assert_eq!(h.sent_of(MessageType::Hello).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hello_retries_until_budget_spent() {
    let h = Harness::new(config());
    h.client
        .connect(h.hub, false, Duration::from_secs(60))
        .await
        .unwrap();
    h.handler().on_established();

    sleep(Duration::from_secs(30)).await;

    assert_eq!(h.sent_of(MessageType::Hello).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_establish_starts_one_hello_loop() {
    let h = Harness::connected(config()).await;
    h.handler().on_established();
    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 2);

    h.deliver(&welcome());
    h.handler().on_established();
    assert_eq!(h.client.state(), HandshakeState::Ready);
    assert!(h.client.is_ready());
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_connects_when_hub_is_known() {
    let h = Harness::new(config());
    let start = Instant::now();
    h.client.connect(h.hub, false, Duration::ZERO).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(h.client.is_connected());

    // No time left for HELLO, but the session is still identified.
    h.handler().on_established();
    sleep(Duration::from_secs(10)).await;
    assert!(h.session().was_identified());
    assert!(h.sent_of(MessageType::Hello).is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_fails_fast_on_any_wait() {
    let h = Harness::new(config());
    let unknown = rrc_core::DestinationHash::new([0x55; 16]);
    let start = Instant::now();
    let err = h
        .client
        .connect(unknown, false, Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "got {err}");
    assert_eq!(start.elapsed(), Duration::ZERO);

    let err = h
        .client
        .connect(h.hub, true, Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "got {err}");
    assert!(h.client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn unbounded_timeout_waits_without_overflow() {
    let h = Harness::new(config());
    h.client
        .connect(h.hub, false, Duration::MAX)
        .await
        .unwrap();
    h.handler().on_established();
    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 3);

    let client = h.client.clone();
    let hub = h.hub;
    let connecting = tokio::spawn(async move { client.connect(hub, true, Duration::MAX).await });
    while h.transport.sessions_opened() < 2 {
        sleep(Duration::from_millis(10)).await;
    }
    h.handler().on_established();
    sleep(Duration::from_secs(60)).await;
    assert!(!connecting.is_finished());

    h.deliver(&welcome());
    connecting.await.unwrap().unwrap();
    assert!(h.client.is_ready());
}

#[tokio::test(start_paused = true)]
async fn welcome_between_attempts_unblocks_connect() {
    let h = Harness::new(config());
    let client = h.client.clone();
    let hub = h.hub;
    let connecting =
        tokio::spawn(async move { client.connect(hub, true, Duration::from_secs(20)).await });

    while h.transport.sessions_opened() == 0 {
        sleep(Duration::from_millis(10)).await;
    }
    h.handler().on_established();
    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 2);
    assert!(!connecting.is_finished());

    h.deliver(&welcome());

    connecting.await.unwrap().unwrap();
    assert!(h.client.is_ready());
    assert_eq!(h.client.state(), HandshakeState::Ready);
    assert_eq!(h.events.welcomes.lock().unwrap().len(), 1);

    // No further HELLOs once the hub has answered.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn welcome_timeout_fails_but_keeps_session() {
    let h = Harness::new(config());
    let client = h.client.clone();
    let hub = h.hub;
    let connecting =
        tokio::spawn(async move { client.connect(hub, true, Duration::from_secs(10)).await });

    while h.transport.sessions_opened() == 0 {
        sleep(Duration::from_millis(10)).await;
    }
    h.handler().on_established();

    let err = connecting.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "got {err}");
    assert_eq!(h.client.state(), HandshakeState::Failed);
    assert!(h.client.is_connected());
    assert_eq!(h.sent_of(MessageType::Hello).len(), 3);

    // A late WELCOME still makes the session usable.
    h.deliver(&welcome());
    assert!(h.client.is_ready());
    assert_eq!(h.client.state(), HandshakeState::Ready);
}

#[tokio::test(start_paused = true)]
async fn close_is_idempotent_and_notifies_once() {
    let h = Harness::connected(config()).await;
    h.deliver(&hub_frame(MessageType::Joined).with_room("lobby"));
    assert_eq!(h.client.rooms(), vec!["lobby".to_string()]);

    h.client.close();
    h.client.close();

    assert_eq!(h.events.close_count(), 1);
    assert!(h.session().is_torn_down());
    assert!(!h.client.is_connected());
    assert!(h.client.rooms().is_empty());
    assert_eq!(h.client.state(), HandshakeState::Closed);
}

#[tokio::test(start_paused = true)]
async fn close_without_session_is_silent() {
    let h = Harness::new(config());
    h.client.close();
    assert_eq!(h.events.close_count(), 0);
    assert_eq!(h.client.state(), HandshakeState::Idle);
}

#[tokio::test(start_paused = true)]
async fn close_cancels_in_flight_transfers() {
    let h = Harness::connected(config()).await;
    h.deliver(&announcement(b"r1", ResourceKind::Notice, 64, None, None).with_room("lobby"));
    let transfer = MockTransfer::new(1, vec![b'n'; 64]);
    assert!(h.handler().on_transfer_advertised(transfer.clone()));
    assert_eq!(h.client.active_transfers(), 1);

    h.client.close();

    assert!(transfer.was_cancelled());
    assert_eq!(h.client.active_transfers(), 0);
    assert_eq!(h.client.pending_expectations(), 0);
}

#[tokio::test(start_paused = true)]
async fn late_callbacks_after_close_are_ignored() {
    let h = Harness::connected(config()).await;
    let handler = h.handler();
    h.client.close();
    let hellos = h.sent_of(MessageType::Hello).len();

    handler.on_frame(&hub_frame(MessageType::Joined).with_room("lobby").encode().unwrap());
    handler.on_frame(&welcome().encode().unwrap());
    handler.on_closed();
    handler.on_established();

    let transfer = MockTransfer::new(3, vec![0; 10]);
    assert!(!handler.on_transfer_advertised(transfer.clone()));
    handler.on_transfer_concluded(transfer.clone());
    assert!(transfer.was_released());

    sleep(Duration::from_secs(10)).await;

    assert!(h.client.rooms().is_empty());
    assert!(!h.client.is_ready());
    assert_eq!(h.events.close_count(), 1);
    assert!(h.events.welcomes.lock().unwrap().is_empty());
    assert_eq!(h.sent_of(MessageType::Hello).len(), hellos);
    assert_eq!(h.client.state(), HandshakeState::Closed);
}

#[tokio::test(start_paused = true)]
async fn hello_loop_stops_when_session_closes() {
    let h = Harness::connected(config()).await;
    h.client.close();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(h.sent_of(MessageType::Hello).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn remote_close_clears_state_and_notifies() {
    let h = Harness::connected(config()).await;
    h.deliver(&welcome());
    h.deliver(&hub_frame(MessageType::Joined).with_room("lobby"));

    h.handler().on_closed();

    assert_eq!(h.events.close_count(), 1);
    assert!(!h.client.is_connected());
    assert!(!h.client.is_ready());
    assert!(h.client.rooms().is_empty());
    assert_eq!(h.client.state(), HandshakeState::Closed);
    // The transport already closed it; the client does not tear it down again.
    assert!(!h.session().is_torn_down());

    h.handler().on_closed();
    assert_eq!(h.events.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_replaces_previous_session() {
    let h = Harness::connected(config()).await;
    let first_session = h.session();
    let first_handler = h.handler();
    h.deliver(&hub_frame(MessageType::Joined).with_room("lobby"));

    h.client
        .connect(h.hub, false, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(h.transport.sessions_opened(), 2);
    assert!(first_session.is_torn_down());
    assert_eq!(h.events.close_count(), 1);
    assert!(h.client.rooms().is_empty());

    // The old session's frames no longer reach the client.
    first_handler.on_frame(&hub_frame(MessageType::Joined).with_room("old").encode().unwrap());
    assert!(h.client.rooms().is_empty());

    h.deliver(&hub_frame(MessageType::Joined).with_room("new"));
    assert_eq!(h.client.rooms(), vec!["new".to_string()]);
}
