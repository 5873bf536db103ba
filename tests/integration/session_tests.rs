//! Integration tests for the SessionService → connection FSM → request
//! pipeline, driven through the scripted transport.

use crate::mock_hw::{
    IndicatorCall, MockIndicator, ScriptedTransport, TransportCall, connected, connecting, service, service_with,
};

use hellolink::app::commands::AppCommand;
use hellolink::app::events::AppEvent;
use hellolink::app::ports::TransportEvent;
use hellolink::app::service::MAX_RESPONSE_LEN;
use hellolink::config::SessionConfig;
use hellolink::error::{ConnectionError, Error, SetupError};
use hellolink::fsm::StateId;
use hellolink::request::{RequestId, RequestState, RequestStatus};

fn no_auto_connect() -> SessionConfig {
    SessionConfig {
        auto_connect: false,
        ..SessionConfig::default()
    }
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn start_announces_identity_and_auto_connects() {
    let svc = connecting();

    assert_eq!(svc.state(), StateId::Connecting);
    assert_eq!(svc.transport().calls[0], TransportCall::Setup);
    assert_eq!(svc.transport().count(|c| *c == TransportCall::Initiate), 1);
    match &svc.sink().events[0] {
        AppEvent::Started { identity } => assert_eq!(identity.as_str(), "https://blecon.dev/hl-test01"),
        other => panic!("first event should be Started, got {:?}", other),
    }
    assert_eq!(svc.request().state(), RequestState::Ready);
}

#[test]
fn start_without_auto_connect_stays_idle() {
    let mut svc = service(no_auto_connect());
    svc.start().unwrap();
    assert_eq!(svc.state(), StateId::Idle);
    assert_eq!(svc.transport().count(|c| *c == TransportCall::Initiate), 0);
}

#[test]
fn start_fails_when_indicator_not_ready() {
    let mut indicator = MockIndicator::new();
    indicator.ready = false;
    let mut svc = service_with(SessionConfig::default(), ScriptedTransport::new(), indicator);

    assert_eq!(svc.start(), Err(Error::Setup(SetupError::IndicatorNotReady)));
    assert!(svc.transport().calls.is_empty(), "transport untouched");
}

#[test]
fn start_fails_when_transport_setup_fails() {
    let mut transport = ScriptedTransport::new();
    transport.fail_setup = true;
    let mut svc = service_with(SessionConfig::default(), transport, MockIndicator::new());

    assert_eq!(svc.start(), Err(Error::Setup(SetupError::TransportInit)));
    assert_eq!(svc.state(), StateId::Idle);
    assert!(svc.sink().events.is_empty());
}

// ── Scenario: greeting echoed back ────────────────────────────

#[test]
fn greeting_echo_closes_ok_and_terminates() {
    let (mut svc, id) = connected();

    assert_eq!(
        svc.transport().calls.last(),
        Some(&TransportCall::Submit {
            id,
            payload: b"Hello blecon!".to_vec(),
            is_final: true,
        })
    );
    assert!(svc.sink().position(&AppEvent::RequestSubmitted { id, bytes: 13 }).is_some());

    let t = svc.transport_mut();
    t.queue(TransportEvent::DataSent { id, ok: true });
    t.queue_chunk(id, b"Hello ", false);
    t.queue_chunk(id, b"blecon!", true);
    svc.poll_transport();

    assert_eq!(svc.response().as_bytes(), b"Hello blecon!");
    assert!(svc.response().is_complete());
    assert_eq!(svc.sink().closed(), vec![RequestStatus::Ok]);
    assert_eq!(svc.request().status(), Some(RequestStatus::Ok));
    assert_eq!(svc.state(), StateId::Terminating, "close ends the session");
    assert_eq!(svc.transport().count(|c| *c == TransportCall::Terminate), 1);

    svc.transport_mut().queue(TransportEvent::Disconnected);
    svc.poll_transport();
    assert_eq!(svc.state(), StateId::Idle);
    assert_eq!(svc.sink().closed().len(), 1, "no second close on disconnect");
    assert!(svc.sink().position(&AppEvent::Disconnected).is_some());

    let stats = svc.stats();
    assert_eq!(stats.requests_submitted, 1);
    assert_eq!(stats.requests_completed, 1);
    assert_eq!(stats.chunks_received, 2);
    assert_eq!(stats.bytes_received, 13);
    assert_eq!(stats.disconnects, 1);
}

// ── Scenario: link lost mid-receive ───────────────────────────

#[test]
fn disconnect_mid_receive_closes_request_before_idle() {
    let (mut svc, id) = connected();

    let t = svc.transport_mut();
    t.queue(TransportEvent::DataSent { id, ok: true });
    t.queue_chunk(id, b"Hello ", false);
    t.queue(TransportEvent::Disconnected);
    svc.poll_transport();

    let sink = svc.sink();
    let closed = sink
        .position(&AppEvent::RequestClosed {
            id,
            status: RequestStatus::ConnectionLost,
        })
        .expect("request closed");
    let idle = sink
        .position(&AppEvent::StateChanged {
            from: StateId::Connected,
            to: StateId::Idle,
        })
        .expect("went idle");
    let down = sink.position(&AppEvent::Disconnected).expect("disconnect notified");
    assert!(closed < idle && idle < down, "order: close, idle, disconnected");

    assert_eq!(svc.state(), StateId::Idle);
    assert_eq!(svc.response().as_bytes(), b"Hello ");
    assert!(!svc.response().is_complete());
    assert_eq!(
        svc.transport().count(|c| *c == TransportCall::Terminate),
        0,
        "nothing to tear down after link loss"
    );
}

#[test]
fn disconnect_while_connecting_returns_to_idle() {
    let mut svc = connecting();
    svc.transport_mut().queue(TransportEvent::Disconnected);
    svc.poll_transport();

    assert_eq!(svc.state(), StateId::Idle);
    assert!(svc.sink().closed().is_empty());
    assert!(svc.sink().position(&AppEvent::Disconnected).is_some());
}

// ── Completion orderings ──────────────────────────────────────

#[test]
fn response_before_data_sent_closes_on_send() {
    let (mut svc, id) = connected();

    svc.transport_mut().queue_chunk(id, b"Hello blecon!", true);
    svc.poll_transport();
    assert_eq!(svc.request().state(), RequestState::InFlight, "send still pending");
    assert!(svc.sink().closed().is_empty());

    svc.transport_mut().queue(TransportEvent::DataSent { id, ok: true });
    svc.poll_transport();
    assert_eq!(svc.sink().closed(), vec![RequestStatus::Ok]);
}

#[test]
fn interleaved_completion_closes_once() {
    let (mut svc, id) = connected();

    let t = svc.transport_mut();
    t.queue_chunk(id, b"Hello", false);
    t.queue(TransportEvent::DataSent { id, ok: true });
    t.queue_chunk(id, b" blecon!", true);
    svc.poll_transport();

    assert_eq!(svc.response().as_bytes(), b"Hello blecon!");
    assert_eq!(svc.sink().closed(), vec![RequestStatus::Ok]);
}

#[test]
fn events_after_close_are_dropped() {
    let (mut svc, id) = connected();
    let t = svc.transport_mut();
    t.queue(TransportEvent::DataSent { id, ok: true });
    t.queue_chunk(id, b"x", true);
    svc.poll_transport();
    let before = svc.sink().events.len();

    let t = svc.transport_mut();
    t.queue(TransportEvent::DataSent { id, ok: true });
    t.queue_chunk(id, b"y", true);
    t.queue(TransportEvent::RequestFailed {
        id,
        status: RequestStatus::Timeout,
    });
    svc.poll_transport();

    assert_eq!(svc.sink().events.len(), before);
    assert_eq!(svc.response().as_bytes(), b"x");
}

#[test]
fn stale_request_ids_are_ignored() {
    let (mut svc, id) = connected();
    let stale = RequestId(id.0 + 100);

    let t = svc.transport_mut();
    t.queue(TransportEvent::DataSent { id: stale, ok: false });
    t.queue(TransportEvent::ReceiveFailed { id: stale });
    svc.poll_transport();

    assert_eq!(svc.request().state(), RequestState::InFlight);
    assert!(svc.sink().closed().is_empty());
}

// ── Failures ──────────────────────────────────────────────────

#[test]
fn send_failure_closes_with_send_failed() {
    let (mut svc, id) = connected();
    svc.transport_mut().queue(TransportEvent::DataSent { id, ok: false });
    svc.poll_transport();

    assert!(svc.sink().position(&AppEvent::DataSent { id, ok: false, bytes: 13 }).is_some());
    assert_eq!(svc.sink().closed(), vec![RequestStatus::SendFailed]);
    assert_eq!(svc.state(), StateId::Terminating);
    assert_eq!(svc.stats().requests_failed, 1);
}

#[test]
fn receive_failure_closes_with_receive_failed() {
    let (mut svc, id) = connected();
    let t = svc.transport_mut();
    t.queue(TransportEvent::DataSent { id, ok: true });
    t.queue_chunk(id, b"Hel", false);
    t.queue(TransportEvent::ReceiveFailed { id });
    svc.poll_transport();

    assert_eq!(svc.sink().closed(), vec![RequestStatus::ReceiveFailed]);
    assert_eq!(svc.state(), StateId::Terminating);
}

#[test]
fn transport_timeout_closes_with_timeout() {
    let (mut svc, id) = connected();
    svc.transport_mut().queue(TransportEvent::RequestFailed {
        id,
        status: RequestStatus::Timeout,
    });
    svc.poll_transport();

    assert_eq!(svc.sink().closed(), vec![RequestStatus::Timeout]);
    assert_eq!(svc.state(), StateId::Terminating);
}

#[test]
fn chunk_larger_than_mtu_fails_the_receive() {
    let (mut svc, id) = connected();
    let mtu = svc.config().request.response_mtu as usize;
    svc.transport_mut().queue_chunk(id, &vec![b'a'; mtu + 1], true);
    svc.poll_transport();

    assert_eq!(svc.sink().closed(), vec![RequestStatus::ReceiveFailed]);
    assert!(svc.response().as_bytes().is_empty());
}

#[test]
fn oversized_response_is_reported_as_truncated() {
    let (mut svc, id) = connected();
    let t = svc.transport_mut();
    t.queue(TransportEvent::DataSent { id, ok: true });
    for i in 0..20 {
        t.queue_chunk(id, &[b'r'; 60], i == 19);
    }
    while svc.poll_transport() > 0 {}

    let dropped = 20 * 60 - MAX_RESPONSE_LEN;
    assert_eq!(svc.sink().closed(), vec![RequestStatus::Ok]);
    assert_eq!(svc.response().as_bytes().len(), MAX_RESPONSE_LEN);
    assert_eq!(svc.response().dropped(), dropped);

    let truncated = svc
        .sink()
        .position(&AppEvent::ResponseTruncated { id, dropped })
        .expect("truncation reported");
    let closed = svc
        .sink()
        .position(&AppEvent::RequestClosed { id, status: RequestStatus::Ok })
        .expect("closed");
    assert!(truncated < closed);

    let stats = svc.stats();
    assert_eq!(stats.bytes_received, 1200);
    assert_eq!(stats.responses_truncated, 1);
    assert_eq!(stats.bytes_dropped, dropped as u64);
}

#[test]
fn transport_failure_with_ok_status_closes_rejected() {
    let (mut svc, id) = connected();
    svc.transport_mut().queue(TransportEvent::RequestFailed {
        id,
        status: RequestStatus::Ok,
    });
    svc.poll_transport();

    assert_eq!(svc.sink().closed(), vec![RequestStatus::Rejected]);
    assert_eq!(svc.stats().requests_completed, 0);
    assert_eq!(svc.stats().requests_failed, 1);
    assert_eq!(svc.state(), StateId::Terminating);
}

#[test]
fn submit_rejected_by_transport_closes_with_rejected() {
    let mut svc = connecting();
    svc.transport_mut().reject_submit = true;
    svc.transport_mut().queue(TransportEvent::Connected);
    svc.poll_transport();

    assert_eq!(svc.sink().closed(), vec![RequestStatus::Rejected]);
    assert_eq!(svc.stats().requests_submitted, 0);
    assert_eq!(svc.state(), StateId::Terminating);
    assert_eq!(svc.request().state(), RequestState::Ready, "request released");
}

// ── Connection guards ─────────────────────────────────────────

#[test]
fn initiate_while_connecting_is_rejected_without_side_effects() {
    let mut svc = connecting();
    let events = svc.sink().events.len();

    assert_eq!(svc.initiate(), Err(Error::Connection(ConnectionError::AlreadyConnecting)));
    assert_eq!(svc.state(), StateId::Connecting);
    assert_eq!(svc.transport().count(|c| *c == TransportCall::Initiate), 1);
    assert_eq!(svc.sink().events.len(), events);
}

#[test]
fn initiate_while_connected_is_rejected() {
    let (mut svc, _) = connected();
    assert_eq!(svc.initiate(), Err(Error::Connection(ConnectionError::AlreadyConnected)));
    assert_eq!(svc.state(), StateId::Connected);
}

#[test]
fn terminate_while_idle_is_rejected() {
    let mut svc = service(no_auto_connect());
    svc.start().unwrap();
    assert_eq!(svc.terminate(), Err(Error::Connection(ConnectionError::NotConnected)));
    assert_eq!(svc.transport().count(|c| *c == TransportCall::Terminate), 0);
}

#[test]
fn commands_while_terminating_are_rejected() {
    let (mut svc, _) = connected();
    svc.terminate().unwrap();
    assert_eq!(svc.state(), StateId::Terminating);
    assert_eq!(svc.initiate(), Err(Error::Connection(ConnectionError::TerminationPending)));
    assert_eq!(svc.terminate(), Err(Error::Connection(ConnectionError::TerminationPending)));
}

#[test]
fn terminate_while_connecting_tears_down() {
    let mut svc = connecting();
    svc.handle_command(AppCommand::Terminate).unwrap();
    assert_eq!(svc.state(), StateId::Terminating);

    // A late link-up is ignored; the disconnect finishes the teardown.
    let t = svc.transport_mut();
    t.queue(TransportEvent::Connected);
    t.queue(TransportEvent::Disconnected);
    svc.poll_transport();
    assert_eq!(svc.state(), StateId::Idle);
    assert_eq!(svc.transport().last_submit(), None);
}

#[test]
fn initiate_refused_by_transport_rolls_back() {
    let mut svc = service(no_auto_connect());
    svc.start().unwrap();
    svc.transport_mut().reject_initiate = true;

    assert_eq!(svc.initiate(), Err(Error::Connection(ConnectionError::TransportRejected)));
    assert_eq!(svc.state(), StateId::Idle);
    assert!(
        svc.sink()
            .position(&AppEvent::StateChanged {
                from: StateId::Connecting,
                to: StateId::Idle,
            })
            .is_some()
    );
}

#[test]
fn terminate_refused_by_transport_stays_connected() {
    let (mut svc, _) = connected();
    svc.transport_mut().reject_terminate = true;
    assert_eq!(svc.terminate(), Err(Error::Connection(ConnectionError::TransportRejected)));
    assert_eq!(svc.state(), StateId::Connected);
}

#[test]
fn duplicate_link_up_submits_once() {
    let (mut svc, _) = connected();
    svc.transport_mut().queue(TransportEvent::Connected);
    svc.poll_transport();
    assert_eq!(svc.transport().count(|c| matches!(c, TransportCall::Submit { .. })), 1);
}

#[test]
fn reconnect_starts_a_fresh_request() {
    let (mut svc, first) = connected();
    let t = svc.transport_mut();
    t.queue(TransportEvent::DataSent { id: first, ok: true });
    t.queue_chunk(first, b"Hello blecon!", true);
    t.queue(TransportEvent::Disconnected);
    svc.poll_transport();
    assert_eq!(svc.state(), StateId::Idle);

    svc.initiate().unwrap();
    svc.transport_mut().queue(TransportEvent::Connected);
    svc.poll_transport();

    let (second, _) = svc.transport().last_submit().unwrap();
    assert_ne!(first, second);
    assert!(svc.response().as_bytes().is_empty(), "response reset per session");
    assert_eq!(svc.request().state(), RequestState::InFlight);
    assert_eq!(svc.stats().sessions_established, 2);
}

// ── Misc notifications ────────────────────────────────────────

#[test]
fn time_update_is_forwarded() {
    let mut svc = connecting();
    svc.transport_mut().queue(TransportEvent::TimeUpdated {
        utc_secs: 1_700_000_000,
    });
    svc.poll_transport();
    assert!(
        svc.sink()
            .position(&AppEvent::TimeUpdated {
                utc_secs: 1_700_000_000
            })
            .is_some()
    );
}

#[test]
fn announce_blinks_and_end_turns_off() {
    let mut svc = connecting();
    svc.handle_command(AppCommand::Announce).unwrap();

    assert_eq!(
        svc.indicator().calls.last(),
        Some(&IndicatorCall::Blinking { on_ms: 100, off_ms: 100 })
    );
    assert_eq!(svc.transport().count(|c| *c == TransportCall::Announce), 1);
    assert!(svc.sink().position(&AppEvent::Announcing).is_some());

    svc.handle_command(AppCommand::EndAnnounce).unwrap();
    assert_eq!(svc.indicator().calls.last(), Some(&IndicatorCall::Off));
    assert!(svc.sink().position(&AppEvent::AnnounceEnded).is_some());
}

#[test]
fn failed_announce_turns_indicator_off() {
    let mut svc = connecting();
    svc.transport_mut().fail_announce = true;

    assert_eq!(svc.announce(), Err(Error::Connection(ConnectionError::TransportRejected)));
    assert_eq!(svc.indicator().calls.last(), Some(&IndicatorCall::Off));
    assert!(svc.sink().position(&AppEvent::Announcing).is_none());
}
