//! Heartbeat and feature-scope behaviour through a live session.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opendebate_client::testing::{ChannelConnector, RecordingUi, ServerEnd};
use opendebate_client::{
    create_session, ConnectionState, FeatureScope, HeartbeatConfig, HeartbeatPhase,
    LivenessAlert, LivenessOptions, SessionConfig, SessionHandle,
};
use opendebate_protocol::{decode, Envelope, Status};

fn heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_secs(10),
        ack_timeout: Duration::from_secs(10),
        max_retries: 5,
    }
}

async fn connected_session() -> (SessionHandle, ServerEnd, RecordingUi) {
    let config = SessionConfig::for_page("https://opendebate.org/pairing/").expect("config");
    let connector = ChannelConnector::new();
    let ui = RecordingUi::new();
    let session = create_session(config, Arc::new(connector.clone()), Arc::new(ui.clone()));

    session.connect().expect("connect");
    let server = connector.next_server().await.expect("accepted connection");
    session
        .watch_state()
        .wait_for(|state| *state == ConnectionState::Connected)
        .await
        .expect("session task alive");
    (session, server, ui)
}

async fn wait_for_phase(session: &SessionHandle, want: HeartbeatPhase) {
    session
        .watch_heartbeat()
        .wait_for(|phase| *phase == want)
        .await
        .expect("session task alive");
}

fn keepalives(server: &mut ServerEnd) -> usize {
    server
        .drain_received()
        .iter()
        .filter_map(|frame| decode(frame).ok())
        .filter(|envelope| envelope.topic == "pairing" && envelope.event_type == "keepalive")
        .count()
}

fn ack(status: Status) -> Envelope {
    Envelope::new("pairing", "keepalive_ack").with_status(status)
}

#[tokio::test(start_paused = true)]
async fn first_keepalive_goes_out_immediately() {
    let (session, mut server, _ui) = connected_session().await;
    session
        .start_heartbeat(LivenessOptions::pairing(heartbeat()))
        .expect("start");

    let first = server.recv_envelope().await.expect("keepalive");
    assert_eq!(first.event_type, "keepalive");
    assert_eq!(session.heartbeat_phase(), HeartbeatPhase::AwaitingAck);
}

#[tokio::test(start_paused = true)]
async fn successful_ack_clears_the_error_banner() {
    let (session, mut server, ui) = connected_session().await;
    session
        .start_heartbeat(LivenessOptions::pairing(heartbeat()))
        .expect("start");
    server.recv().await.expect("first keepalive");

    // miss one ack
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(ui.current_alert(), Some(LivenessAlert::ConnectionError));

    server.send_envelope(&ack(Status::Success));
    wait_for_phase(&session, HeartbeatPhase::Beating).await;

    assert_eq!(ui.current_alert(), None);
    assert_eq!(
        ui.alerts(),
        vec![Some(LivenessAlert::ConnectionError), None]
    );
}

#[tokio::test(start_paused = true)]
async fn error_ack_raises_server_error() {
    let (session, mut server, ui) = connected_session().await;
    session
        .start_heartbeat(LivenessOptions::pairing(heartbeat()))
        .expect("start");
    server.recv().await.expect("first keepalive");

    server.send_envelope(&ack(Status::Error).with_message("No active pairing request"));
    wait_for_phase(&session, HeartbeatPhase::Beating).await;

    assert_eq!(
        ui.current_alert(),
        Some(LivenessAlert::ServerError(Some(
            "No active pairing request".to_string()
        )))
    );
    // the ack is still a regular message, so it is toasted like any other error
    let notice = ui.notices().pop().expect("toast");
    assert_eq!(
        notice.text,
        "Error websocket status (keepalive_ack): No active pairing request"
    );
}

#[tokio::test(start_paused = true)]
async fn consecutive_timeouts_exhaust_the_heartbeat() {
    let (session, mut server, ui) = connected_session().await;
    let exhausted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exhausted);
    session
        .start_heartbeat(
            LivenessOptions::pairing(heartbeat()).on_exhausted(move || {
                flag.store(true, Ordering::SeqCst);
            }),
        )
        .expect("start");

    wait_for_phase(&session, HeartbeatPhase::Exhausted).await;
    assert_eq!(keepalives(&mut server), 5);
    assert!(exhausted.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(keepalives(&mut server), 0);

    // the banner stays up, raised once
    assert_eq!(ui.alerts(), vec![Some(LivenessAlert::ConnectionError)]);
    assert_eq!(session.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_can_clear_the_banner() {
    let (session, _server, ui) = connected_session().await;
    session
        .start_heartbeat(LivenessOptions::pairing(heartbeat()).clear_alert_on_exhaustion(true))
        .expect("start");

    wait_for_phase(&session, HeartbeatPhase::Exhausted).await;
    assert_eq!(ui.current_alert(), None);
}

#[tokio::test(start_paused = true)]
async fn restarting_the_heartbeat_clears_the_previous_banner() {
    let (session, mut server, ui) = connected_session().await;
    session
        .start_heartbeat(LivenessOptions::pairing(heartbeat()))
        .expect("start");
    server.recv().await.expect("first keepalive");

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(ui.current_alert(), Some(LivenessAlert::ConnectionError));

    session
        .start_heartbeat(LivenessOptions::pairing(heartbeat()))
        .expect("restart");
    server.send_envelope(&ack(Status::Success));
    wait_for_phase(&session, HeartbeatPhase::Beating).await;

    assert_eq!(ui.current_alert(), None);
    assert_eq!(
        ui.alerts(),
        vec![Some(LivenessAlert::ConnectionError), None]
    );
}

#[tokio::test(start_paused = true)]
async fn keepalives_are_not_queued_while_reconnecting() {
    let config = SessionConfig::for_page("https://opendebate.org/pairing/").expect("config");
    let connector = ChannelConnector::new();
    let session = create_session(
        config,
        Arc::new(connector.clone()),
        Arc::new(RecordingUi::new()),
    );
    session.connect().expect("connect");
    let mut first = connector.next_server().await.expect("accepted connection");
    session
        .watch_state()
        .wait_for(|state| *state == ConnectionState::Connected)
        .await
        .expect("session task alive");
    session
        .start_heartbeat(LivenessOptions::pairing(heartbeat()))
        .expect("start");
    first.recv().await.expect("first keepalive");

    // four refused reopens keep the socket down past the 10s beat
    connector.refuse_next(4);
    first.close();
    let mut second = connector.next_server().await.expect("reconnected");
    session
        .watch_state()
        .wait_for(|state| *state == ConnectionState::Connected)
        .await
        .expect("session task alive");
    assert_eq!(connector.attempts(), 6);
    assert_eq!(keepalives(&mut second), 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(keepalives(&mut second), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_is_paced_by_the_clock() {
    let (session, mut server, _ui) = connected_session().await;
    session
        .start_heartbeat(LivenessOptions::pairing(HeartbeatConfig {
            interval: Duration::ZERO,
            ..heartbeat()
        }))
        .expect("start");
    server.recv().await.expect("first keepalive");

    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    let sent = keepalives(&mut server);
    assert!((1..=11).contains(&sent), "sent {sent} keepalives in 10ms");
}

#[tokio::test(start_paused = true)]
async fn stop_heartbeat_cancels_both_timers() {
    let (session, mut server, ui) = connected_session().await;
    session
        .start_heartbeat(LivenessOptions::pairing(heartbeat()))
        .expect("start");
    tokio::time::sleep(Duration::from_millis(10_500)).await;

    session.stop_heartbeat().expect("stop");
    session.stop_heartbeat().expect("stop again");
    wait_for_phase(&session, HeartbeatPhase::Stopped).await;
    server.drain_received();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(keepalives(&mut server), 0);
    assert_eq!(ui.current_alert(), None);
}

#[tokio::test(start_paused = true)]
async fn closing_a_scope_cancels_its_tickers_and_heartbeat() {
    let (session, mut server, _ui) = connected_session().await;
    let ticks = Arc::new(AtomicU32::new(0));

    let mut scope = FeatureScope::new("pairing", session.clone());
    let counter = Arc::clone(&ticks);
    scope.spawn_ticker(Duration::from_secs(1), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    scope
        .start_liveness(LivenessOptions::pairing(heartbeat()))
        .expect("start");
    assert_eq!(scope.ticker_count(), 1);

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 2);

    drop(scope);
    wait_for_phase(&session, HeartbeatPhase::Stopped).await;
    server.drain_received();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 2);
    assert_eq!(keepalives(&mut server), 0);
}

#[tokio::test(start_paused = true)]
async fn reopening_a_scope_does_not_leak_timers() {
    let (session, _server, _ui) = connected_session().await;
    let ticks = Arc::new(AtomicU32::new(0));

    for _ in 0..3 {
        let mut scope = FeatureScope::new("discussion", session.clone());
        let counter = Arc::clone(&ticks);
        scope.spawn_ticker(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        scope.close();
        assert!(scope.is_closed());
    }

    let before = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(before, 3);
    assert_eq!(ticks.load(Ordering::SeqCst), before);
}
