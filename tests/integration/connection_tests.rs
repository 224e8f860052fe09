//! ConnectionManager state machine and reconnect loop.

use std::rc::Rc;
use std::time::Duration;

use futures_lite::future;
use pulsenode::app::events::BrokerEvent;
use pulsenode::app::ports::BrokerPort;
use pulsenode::connection::{ConnectAttempt, ConnectionManager, ConnectionState};
use pulsenode::error::CommsError;
use pulsenode::supervisor::LoopState;

use crate::mock_broker::{MockBroker, MockFactory, MockLink, config};

type Manager = ConnectionManager<MockFactory, MockLink>;

fn manager(broker: &Rc<MockBroker>, link: MockLink, overrides: &[(&str, &str)]) -> Manager {
    ConnectionManager::new(&config(overrides), MockFactory(broker.clone()), link)
}

/// Apply every queued lifecycle event, as the connection task would.
fn pump(mgr: &Manager) {
    while let Some(event) = mgr.events().try_next() {
        mgr.handle_event(event);
    }
}

async fn until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        future::yield_now().await;
    }
}

const FAST_RETRY: &[(&str, &str)] = &[("reconnect_initial_ms", "1"), ("reconnect_max_ms", "4")];

#[test]
fn first_session_reports_zero_reconnects() {
    let broker = MockBroker::new();
    let mgr = manager(&broker, MockLink::default(), &[]);
    assert_eq!(mgr.reconnects(), -1);

    assert_eq!(mgr.connect(), ConnectAttempt::Pending);
    assert_eq!(mgr.state(), ConnectionState::Connecting);
    assert!(!mgr.is_connected());

    pump(&mgr);
    assert_eq!(mgr.state(), ConnectionState::Connected);
    assert!(mgr.connected_ready());
    assert!(!mgr.disconnected_ready());
    assert_eq!(mgr.reconnects(), 0);
}

#[test]
fn connect_is_idempotent_while_connected() {
    let broker = MockBroker::new();
    let mgr = manager(&broker, MockLink::default(), &[]);
    mgr.connect();
    pump(&mgr);

    assert_eq!(mgr.connect(), ConnectAttempt::AlreadyConnected);
    assert_eq!(broker.created.get(), 1);
    assert_eq!(mgr.reconnects(), 0);
}

#[test]
fn publish_while_disconnected_never_reaches_transport() {
    let broker = MockBroker::new();
    broker.fail_connect.set(true);
    let mgr = manager(&broker, MockLink::default(), &[]);

    mgr.publish("r/pulses", "1.0");
    assert_eq!(
        mgr.connect(),
        ConnectAttempt::Failed(CommsError::HandshakeFailed)
    );
    assert!(mgr.disconnected_ready());
    mgr.publish("r/pulses", "1.0");

    assert!(broker.published.borrow().is_empty());
}

#[test]
fn publish_while_connecting_is_dropped() {
    let broker = MockBroker::new();
    broker.silent.set(true);
    let mgr = manager(&broker, MockLink::default(), &[]);

    assert_eq!(mgr.connect(), ConnectAttempt::Pending);
    assert!(!mgr.connected_ready() && !mgr.disconnected_ready());
    mgr.publish("r/pulses", "1.0");
    assert!(broker.published.borrow().is_empty());
}

#[test]
fn publish_failure_raises_disconnected_ready() {
    let broker = MockBroker::new();
    let mgr = manager(&broker, MockLink::default(), &[]);
    mgr.connect();
    pump(&mgr);

    broker.fail_publish.set(true);
    mgr.publish("r/pulses", "1.0");

    assert!(mgr.disconnected_ready());
    assert!(!mgr.connected_ready());
    assert_eq!(mgr.state(), ConnectionState::Disconnected);
    assert_eq!(mgr.events().try_next(), Some(BrokerEvent::TransportError));
}

#[test]
fn link_failure_fails_attempt_before_handshake() {
    let broker = MockBroker::new();
    let mgr = manager(&broker, MockLink::failing(), &[]);

    assert_eq!(
        mgr.connect(),
        ConnectAttempt::Failed(CommsError::LinkConnectFailed)
    );
    assert!(mgr.disconnected_ready());
    assert!(broker.published.borrow().is_empty());
}

#[test]
fn connected_event_outside_connecting_is_ignored() {
    let broker = MockBroker::new();
    let mgr = manager(&broker, MockLink::default(), &[]);

    mgr.handle_event(BrokerEvent::Connected);
    assert_eq!(mgr.state(), ConnectionState::Disconnected);
    assert_eq!(mgr.reconnects(), -1);
}

#[test]
fn stale_disconnect_does_not_end_new_session() {
    let broker = MockBroker::new();
    let mgr = manager(&broker, MockLink::default(), &[]);
    mgr.connect();
    pump(&mgr);

    mgr.handle_event(BrokerEvent::Disconnected);
    mgr.disconnect();
    // Late notification from the torn-down client.
    mgr.events().emit(BrokerEvent::Disconnected);

    mgr.connect();
    pump(&mgr);
    assert!(mgr.is_connected());
    assert_eq!(mgr.reconnects(), 1);
}

#[test]
fn disconnect_tears_down_client_once() {
    let broker = MockBroker::new();
    let mgr = manager(&broker, MockLink::default(), &[]);
    mgr.connect();
    pump(&mgr);

    mgr.disconnect();
    mgr.disconnect();
    assert_eq!(broker.disconnects.get(), 1);
    assert_eq!(mgr.state(), ConnectionState::Disconnected);
    assert!(!mgr.is_connected());
}

#[test]
fn publish_failure_schedules_exactly_one_reconnect() {
    let broker = MockBroker::new();
    let mgr = manager(&broker, MockLink::default(), FAST_RETRY);
    let state = LoopState::new(&mgr);

    let script = async {
        until(|| mgr.is_connected()).await;
        assert_eq!(broker.created.get(), 1);
        assert_eq!(mgr.reconnects(), 0);

        broker.fail_publish.set(true);
        mgr.publish("r/pulses", "1.0");
        broker.fail_publish.set(false);
        assert!(mgr.disconnected_ready());

        until(|| mgr.is_connected()).await;
        assert_eq!(broker.created.get(), 2);
        assert_eq!(broker.disconnects.get(), 1);
        assert_eq!(mgr.reconnects(), 1);

        // Settle: nothing else should be scheduled.
        async_io_mini::Timer::after(Duration::from_millis(20)).await;
        assert_eq!(broker.created.get(), 2);
        Ok(())
    };

    let result = future::block_on(future::or(mgr.run(&state), script));
    assert_eq!(result, Ok(()));
}

#[test]
fn retry_ceiling_ends_run() {
    let broker = MockBroker::new();
    let link = MockLink::failing();
    let attempts = link.attempts.clone();
    let mut overrides = FAST_RETRY.to_vec();
    overrides.push(("reconnect_max_attempts", "3"));
    let mgr = manager(&broker, link, &overrides);
    let state = LoopState::new(&mgr);

    let result = future::block_on(mgr.run(&state));

    assert_eq!(result, Err(CommsError::RetriesExhausted));
    assert_eq!(attempts.get(), 3);
    assert_eq!(broker.created.get(), 3);
    assert_eq!(mgr.reconnects(), -1);
}

#[test]
fn successful_session_resets_retry_budget() {
    let broker = MockBroker::new();
    let mut overrides = FAST_RETRY.to_vec();
    overrides.push(("reconnect_max_attempts", "2"));
    let mgr = manager(&broker, MockLink::default(), &overrides);
    let state = LoopState::new(&mgr);

    // Each session comes up and is then killed by a failed publish; with a
    // ceiling of 2 the loop would give up on the second drop if the budget
    // were not reset by the successful connect.
    let script = async {
        for round in 0..3 {
            until(|| mgr.is_connected()).await;
            assert_eq!(mgr.reconnects(), round);
            broker.fail_publish.set(true);
            mgr.publish("r/pulses", "1.0");
            broker.fail_publish.set(false);
        }
        until(|| mgr.is_connected()).await;
        Ok(())
    };

    let result = future::block_on(future::or(mgr.run(&state), script));
    assert_eq!(result, Ok(()));
    assert_eq!(mgr.reconnects(), 3);
}
