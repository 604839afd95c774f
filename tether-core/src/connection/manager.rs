// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection Manager
//!
//! The state machine driving connect, disconnect and retry for the one
//! session this endpoint holds. Transition requests from any thread (public
//! API, retry timer, liveness prober, connectivity events) are funneled
//! through a single queue and processed by one driver at a time, so state
//! changes never interleave. Listeners are notified during each transition
//! and must queue follow-up transitions instead of driving them inline.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use tracing::{debug, error, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::session::{
    AuthError, ConnectError, Session, SessionConnector, SessionHandle, SessionSink,
};
use crate::settings::{SessionConfig, Settings};

use super::keepalive::ReconnectRequester;
use super::retry::RetryScheduler;
use super::{ConnectionState, StateListener};

/// Receiver for failure reports that do not ride on a state transition.
pub trait FailureReporter: Send + Sync {
    /// Records a human-readable failure reason for status queries.
    fn failure(&self, reason: &str);
}

/// A requested target state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Establish an authenticated session.
    Connect,
    /// Tear the session down. The reason is surfaced to listeners.
    Disconnect { reason: String },
    /// Park until a usable network is reported.
    WaitForNetwork,
}

impl Request {
    fn disconnect() -> Self {
        Request::Disconnect {
            reason: String::new(),
        }
    }
}

#[derive(Default)]
struct Control {
    queue: VecDeque<Request>,
    driving: bool,
}

struct Machine {
    state: ConnectionState,
    session: Option<Arc<dyn Session>>,
    session_config: Option<Arc<SessionConfig>>,
    /// True once a connected fan-out completed for the current session, so
    /// teardown knows whether listeners saw it live.
    saw_live_session: bool,
}

pub(crate) struct ManagerShared {
    settings: Arc<Settings>,
    connector: Arc<dyn SessionConnector>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    sink: Arc<dyn SessionSink>,
    reporter: Arc<dyn FailureReporter>,
    retry: RetryScheduler,
    listeners: OnceLock<Box<[Arc<dyn StateListener>]>>,
    ctl: Mutex<Control>,
    machine: Mutex<Machine>,
    handle: SessionHandle,
}

/// Owns the connection lifecycle. Constructed once by the composition root
/// and passed by reference; there is no global instance.
pub struct ConnectionManager {
    shared: Arc<ManagerShared>,
}

impl ConnectionManager {
    /// Creates a manager. Listeners are installed separately, once, via
    /// [`install_listeners`](Self::install_listeners).
    pub fn new(
        settings: Arc<Settings>,
        connector: Arc<dyn SessionConnector>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        sink: Arc<dyn SessionSink>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        let shared = Arc::new(ManagerShared {
            settings,
            connector,
            connectivity,
            sink,
            reporter,
            retry: RetryScheduler::new(),
            listeners: OnceLock::new(),
            ctl: Mutex::new(Control::default()),
            machine: Mutex::new(Machine {
                state: ConnectionState::Disconnected,
                session: None,
                session_config: None,
                saw_live_session: false,
            }),
            handle: SessionHandle::new(),
        });

        let weak = Arc::downgrade(&shared);
        shared.retry.set_action(move || {
            if let Some(shared) = weak.upgrade() {
                debug!("reconnect timer fired, requesting connect");
                ManagerShared::submit(&shared, Request::Connect);
            }
        });

        ConnectionManager { shared }
    }

    /// Installs the listener list. The list is frozen afterwards; calling
    /// this twice is a programming error.
    pub fn install_listeners(&self, listeners: Vec<Arc<dyn StateListener>>) {
        if self
            .shared
            .listeners
            .set(listeners.into_boxed_slice())
            .is_err()
        {
            panic!("connection listeners already installed");
        }
    }

    /// Requests an authenticated connection.
    pub fn connect(&self) {
        ManagerShared::submit(&self.shared, Request::Connect);
    }

    /// Requests a disconnect.
    pub fn disconnect(&self) {
        ManagerShared::submit(&self.shared, Request::disconnect());
    }

    /// Requests a disconnect followed by a fresh connect.
    pub fn reconnect(&self) {
        ManagerShared::submit(&self.shared, Request::disconnect());
        ManagerShared::submit(&self.shared, Request::Connect);
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock_machine().state
    }

    /// Returns true while an authenticated session is established.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns true while a reconnect timer is armed.
    pub fn is_retry_pending(&self) -> bool {
        self.shared.retry.is_armed()
    }

    /// Shared read-side cell for the current session.
    pub fn session_handle(&self) -> SessionHandle {
        self.shared.handle.clone()
    }

    /// Returns a handle for queueing transition requests from timers and
    /// listeners without keeping the manager alive.
    pub fn requester(&self) -> TransitionRequester {
        TransitionRequester {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Applies a device connectivity change.
    ///
    /// A changed network type invalidates an established session even though
    /// the device is still online, so that case forces a reconnect.
    pub fn connectivity_changed(&self, available: bool, type_changed: bool) {
        debug!(
            "connectivity changed: available={} type_changed={}",
            available, type_changed
        );
        if !available {
            ManagerShared::submit(&self.shared, Request::WaitForNetwork);
            return;
        }
        if type_changed && self.is_connected() {
            ManagerShared::submit(
                &self.shared,
                Request::Disconnect {
                    reason: "network type changed".to_string(),
                },
            );
            ManagerShared::submit(&self.shared, Request::Connect);
            return;
        }
        if !self.is_connected() {
            ManagerShared::submit(&self.shared, Request::Connect);
        }
    }
}

/// Queues transition requests against a manager that may already be gone.
#[derive(Clone)]
pub struct TransitionRequester {
    shared: Weak<ManagerShared>,
}

impl TransitionRequester {
    /// Requests a connect.
    pub fn request_connect(&self) {
        if let Some(shared) = self.shared.upgrade() {
            ManagerShared::submit(&shared, Request::Connect);
        }
    }

    /// Requests a disconnect.
    pub fn request_disconnect(&self, reason: &str) {
        if let Some(shared) = self.shared.upgrade() {
            ManagerShared::submit(
                &shared,
                Request::Disconnect {
                    reason: reason.to_string(),
                },
            );
        }
    }
}

impl ReconnectRequester for TransitionRequester {
    fn request_reconnect(&self, reason: &str) {
        if let Some(shared) = self.shared.upgrade() {
            ManagerShared::submit(
                &shared,
                Request::Disconnect {
                    reason: reason.to_string(),
                },
            );
            ManagerShared::submit(&shared, Request::Connect);
        }
    }
}

impl ManagerShared {
    /// Enqueues a request and drives the queue unless another thread
    /// already does. Listener callbacks run on the driving thread after the
    /// control lock is released, so a listener enqueueing a follow-up
    /// request never deadlocks: it lands in the queue and is processed once
    /// the current transition has finished.
    fn submit(shared: &Arc<ManagerShared>, request: Request) {
        {
            let mut ctl = shared.lock_ctl();
            ctl.queue.push_back(request);
            if ctl.driving {
                return;
            }
            ctl.driving = true;
        }
        loop {
            let next = {
                let mut ctl = shared.lock_ctl();
                match ctl.queue.pop_front() {
                    Some(request) => request,
                    None => {
                        ctl.driving = false;
                        return;
                    }
                }
            };
            shared.change_state(next);
        }
    }

    fn change_state(&self, request: Request) {
        let current = self.lock_machine().state;
        debug!("change_state: current={:?} requested={:?}", current, request);
        match (current, request) {
            (ConnectionState::Connected, Request::Connect) => {}
            (ConnectionState::Connected, Request::Disconnect { reason }) => {
                self.close_connection(&reason);
            }
            (ConnectionState::Connected, Request::WaitForNetwork) => {
                self.close_connection("");
                self.enter(ConnectionState::WaitingForNetwork);
            }
            (ConnectionState::Disconnected, Request::Connect) => self.try_to_connect(),
            (ConnectionState::Disconnected, Request::Disconnect { .. }) => {}
            (ConnectionState::Disconnected, Request::WaitForNetwork) => {
                self.enter(ConnectionState::WaitingForNetwork);
            }
            (ConnectionState::WaitingForNetwork, Request::Connect) => self.try_to_connect(),
            (ConnectionState::WaitingForNetwork, Request::Disconnect { reason }) => {
                self.enter_with_reason(ConnectionState::Disconnected, &reason);
            }
            (ConnectionState::WaitingForNetwork, Request::WaitForNetwork) => {}
            (ConnectionState::WaitingForRetry, Request::Connect) => {
                // An explicit connect supersedes the pending timer.
                self.retry.cancel();
                self.try_to_connect();
            }
            (ConnectionState::WaitingForRetry, Request::Disconnect { reason }) => {
                self.retry.cancel();
                self.enter_with_reason(ConnectionState::Disconnected, &reason);
            }
            (ConnectionState::WaitingForRetry, Request::WaitForNetwork) => {
                self.retry.cancel();
                self.enter(ConnectionState::WaitingForNetwork);
            }
            (current, request) => panic!(
                "illegal connection state transition: {:?} requested from {:?}",
                request, current
            ),
        }
    }

    /// Runs the connect sequence. Entered with the machine in Disconnected,
    /// WaitingForNetwork or WaitingForRetry.
    fn try_to_connect(&self) {
        if let Err(e) = self.settings.check_ready() {
            warn!("not ready to connect: {}", e);
            self.reporter.failure(&format!("unable to connect: {}", e));
            return;
        }
        if self.lock_machine().state == ConnectionState::Connected {
            debug!("already connected, nothing to do here");
            return;
        }
        if !self.connectivity.is_network_available() {
            debug!("no data connection available");
            self.enter(ConnectionState::WaitingForNetwork);
            return;
        }

        self.enter(ConnectionState::Connecting);

        let config = self.settings.session_config();
        let reusable = {
            let machine = self.lock_machine();
            match (&machine.session, &machine.session_config) {
                (Some(session), Some(previous)) if Arc::ptr_eq(previous, &config) => {
                    session.is_open().then(|| session.clone())
                }
                _ => None,
            }
        };

        let (session, fresh_session) = match reusable {
            Some(session) => {
                debug!("reusing open session, configuration unchanged");
                (session, false)
            }
            None => match self.connector.open(&config, self.sink.clone()) {
                Ok(session) => (session, true),
                Err(ConnectError::Transient(reason)) => {
                    warn!("connect failed: {}", reason);
                    self.reporter.failure(&reason);
                    self.schedule_retry();
                    return;
                }
                Err(ConnectError::Fatal(reason)) => {
                    error!("connect failed permanently: {}", reason);
                    self.reporter.failure(&reason);
                    self.enter_with_reason(ConnectionState::Disconnected, &reason);
                    return;
                }
            },
        };

        if !session.is_authenticated() {
            match session.authenticate(&config.identity, &config.secret) {
                Ok(()) => {}
                Err(AuthError::NoResponse) => {
                    warn!("authentication got no response, scheduling reconnect");
                    self.reporter.failure("no response from server");
                    self.schedule_retry();
                    return;
                }
                Err(AuthError::Rejected(reason)) => {
                    let reason = format!("authentication rejected: {}", reason);
                    error!("{}; new state: Disconnected", reason);
                    self.reporter.failure(&reason);
                    self.enter_with_reason(ConnectionState::Disconnected, &reason);
                    return;
                }
            }
        }
        // Authentication successful

        {
            let mut machine = self.lock_machine();
            machine.session = Some(session.clone());
            machine.session_config = Some(config);
        }
        self.handle.set(Some(session.clone()));

        if fresh_session {
            for listener in self.listeners() {
                listener.new_session(&session);
            }
        }

        self.enter(ConnectionState::Connected);
        debug!("successfully connected");
    }

    /// Tears down the live session and enters Disconnected.
    fn close_connection(&self, reason: &str) {
        let session = self.lock_machine().session.clone();
        if let Some(session) = session {
            if session.is_open() {
                self.enter(ConnectionState::Disconnecting);
                debug!("closing session");
                if let Err(e) = session.close() {
                    info!("session close failed: {}", e);
                }
            }
            self.enter_with_reason(ConnectionState::Disconnected, reason);
        }
    }

    fn schedule_retry(&self) {
        self.enter(ConnectionState::WaitingForRetry);
        self.retry.schedule(self.settings.retry_delay());
    }

    fn enter(&self, state: ConnectionState) {
        self.enter_with_reason(state, "");
    }

    /// Notifies listeners about the new state, then records it.
    ///
    /// The `reason` is only used for Disconnected.
    fn enter_with_reason(&self, new_state: ConnectionState, reason: &str) {
        match new_state {
            ConnectionState::Connected => {
                let session = self
                    .lock_machine()
                    .session
                    .clone()
                    .expect("no session while entering connected state");
                for listener in self.listeners() {
                    if let Err(e) = listener.connected(&session) {
                        // Simply schedule a reconnect instead of moving to
                        // Disconnected: the connected state was never
                        // reached, and a Connecting -> Disconnected
                        // transition is not part of the table.
                        warn!("connected notification failed: {}", e);
                        self.schedule_retry();
                        return;
                    }
                }
                // Roster setup and queue flushing are done; only now does
                // the endpoint become visible to its peers.
                let status = self.settings.status_message();
                if let Err(e) = session.announce_available(status.as_deref()) {
                    warn!("presence announcement failed: {}", e);
                    self.schedule_retry();
                    return;
                }
            }
            ConnectionState::Disconnected => {
                let (session, saw_live) = {
                    let machine = self.lock_machine();
                    (machine.session.clone(), machine.saw_live_session)
                };
                for listener in self.listeners() {
                    listener.disconnected(reason);
                    if let (Some(session), true) = (&session, saw_live) {
                        listener.session_closed(session);
                    }
                }
                // Listeners are done addressing the session; drop the
                // shared read handle only now.
                self.handle.set(None);
            }
            ConnectionState::Connecting => {
                for listener in self.listeners() {
                    listener.connecting();
                }
            }
            ConnectionState::Disconnecting => {
                for listener in self.listeners() {
                    listener.disconnecting();
                }
            }
            ConnectionState::WaitingForNetwork => {
                for listener in self.listeners() {
                    listener.waiting_for_network();
                }
            }
            ConnectionState::WaitingForRetry => {
                for listener in self.listeners() {
                    listener.waiting_for_retry();
                }
            }
        }

        let mut machine = self.lock_machine();
        machine.state = new_state;
        match new_state {
            ConnectionState::Connected => machine.saw_live_session = true,
            ConnectionState::Disconnected => machine.saw_live_session = false,
            _ => {}
        }
    }

    fn listeners(&self) -> &[Arc<dyn StateListener>] {
        self.listeners.get().map_or(&[], |listeners| listeners)
    }

    fn lock_ctl(&self) -> std::sync::MutexGuard<'_, Control> {
        self.ctl.lock().expect("control lock poisoned")
    }

    fn lock_machine(&self) -> std::sync::MutexGuard<'_, Machine> {
        self.machine.lock().expect("machine lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use crate::connectivity::{AlwaysOnline, SwitchedConnectivity};
    use crate::session::{MockConnector, SessionError};
    use crate::settings::EndpointConfig;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        NewSession,
        Connected,
        Connecting,
        Disconnecting,
        Disconnected(String),
        SessionClosed,
        WaitingForNetwork,
        WaitingForRetry,
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
        fail_connected_times: Mutex<usize>,
    }

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        fn fail_next_connected(&self) {
            *self.fail_connected_times.lock().unwrap() = 1;
        }
    }

    impl StateListener for Recorder {
        fn new_session(&self, _session: &Arc<dyn Session>) {
            self.push(Event::NewSession);
        }

        fn connected(&self, _session: &Arc<dyn Session>) -> Result<(), SessionError> {
            let mut remaining = self.fail_connected_times.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SessionError::NotConnected);
            }
            drop(remaining);
            self.push(Event::Connected);
            Ok(())
        }

        fn connecting(&self) {
            self.push(Event::Connecting);
        }

        fn disconnecting(&self) {
            self.push(Event::Disconnecting);
        }

        fn disconnected(&self, reason: &str) {
            self.push(Event::Disconnected(reason.to_string()));
        }

        fn session_closed(&self, _session: &Arc<dyn Session>) {
            self.push(Event::SessionClosed);
        }

        fn waiting_for_network(&self) {
            self.push(Event::WaitingForNetwork);
        }

        fn waiting_for_retry(&self) {
            self.push(Event::WaitingForRetry);
        }
    }

    #[derive(Default)]
    struct Failures {
        reasons: Mutex<Vec<String>>,
    }

    impl Failures {
        fn reasons(&self) -> Vec<String> {
            self.reasons.lock().unwrap().clone()
        }
    }

    impl FailureReporter for Failures {
        fn failure(&self, reason: &str) {
            self.reasons.lock().unwrap().push(reason.to_string());
        }
    }

    struct NullSink;

    impl SessionSink for NullSink {
        fn message_received(&self, _from: &crate::addressing::FullAddress, _body: &str) {}
        fn presence_changed(&self, _address: &crate::addressing::FullAddress, _available: bool) {}
    }

    fn test_config() -> EndpointConfig {
        EndpointConfig {
            account: Some("endpoint@example.org".into()),
            secret: Some("hunter2".into()),
            peers: vec!["operator@example.org".into()],
            retry_delay_ms: 40,
            ..Default::default()
        }
    }

    struct Fixture {
        manager: ConnectionManager,
        connector: Arc<MockConnector>,
        recorder: Arc<Recorder>,
        failures: Arc<Failures>,
    }

    fn fixture_with(config: EndpointConfig, connectivity: Arc<dyn ConnectivityMonitor>) -> Fixture {
        let connector = Arc::new(MockConnector::new());
        let recorder = Arc::new(Recorder::default());
        let failures = Arc::new(Failures::default());
        let manager = ConnectionManager::new(
            Arc::new(Settings::new(config)),
            connector.clone(),
            connectivity,
            Arc::new(NullSink),
            failures.clone(),
        );
        manager.install_listeners(vec![recorder.clone()]);
        Fixture {
            manager,
            connector,
            recorder,
            failures,
        }
    }

    fn fixture(config: EndpointConfig) -> Fixture {
        fixture_with(config, Arc::new(AlwaysOnline))
    }

    #[test]
    fn test_connect_runs_full_sequence() {
        let f = fixture(test_config());
        f.manager.connect();

        assert_eq!(
            f.recorder.events(),
            vec![Event::Connecting, Event::NewSession, Event::Connected]
        );
        assert!(f.manager.is_connected());
        assert!(f.manager.session_handle().current().is_some());

        // Presence goes out only after the connected fan-out.
        let session = f.connector.last_session().unwrap();
        assert_eq!(session.announcements().len(), 1);
    }

    #[test]
    fn test_incomplete_configuration_reports_without_transition() {
        let f = fixture(EndpointConfig::default());
        f.manager.connect();

        assert_eq!(f.manager.state(), ConnectionState::Disconnected);
        assert!(f.recorder.events().is_empty());
        assert_eq!(f.connector.open_count(), 0);
        assert_eq!(
            f.failures.reasons(),
            vec!["unable to connect: no account configured".to_string()]
        );
    }

    #[test]
    fn test_no_network_waits_without_io() {
        let f = fixture_with(test_config(), Arc::new(SwitchedConnectivity::new(false)));
        f.manager.connect();

        assert_eq!(f.manager.state(), ConnectionState::WaitingForNetwork);
        assert_eq!(f.recorder.events(), vec![Event::WaitingForNetwork]);
        assert_eq!(f.connector.open_count(), 0);
    }

    #[test]
    fn test_transient_connect_failure_retries_automatically() {
        let f = fixture(test_config());
        f.connector
            .fail_next_open(ConnectError::Transient("name resolution failed".into()));
        f.manager.connect();

        assert_eq!(f.manager.state(), ConnectionState::WaitingForRetry);
        assert!(f.manager.is_retry_pending());
        assert_eq!(
            f.recorder.events(),
            vec![Event::Connecting, Event::WaitingForRetry]
        );

        // The timer drives the second attempt on its own.
        thread::sleep(Duration::from_millis(200));
        assert!(f.manager.is_connected());
        assert_eq!(f.connector.open_count(), 2);
    }

    #[test]
    fn test_fatal_connect_failure_goes_disconnected() {
        let f = fixture(test_config());
        f.connector
            .fail_next_open(ConnectError::Fatal("malformed account".into()));
        f.manager.connect();

        assert_eq!(f.manager.state(), ConnectionState::Disconnected);
        assert!(!f.manager.is_retry_pending());
        assert_eq!(
            f.recorder.events(),
            vec![
                Event::Connecting,
                Event::Disconnected("malformed account".into())
            ]
        );
    }

    #[test]
    fn test_auth_rejection_is_terminal() {
        let f = fixture(test_config());
        f.connector
            .fail_next_auth(AuthError::Rejected("bad credentials".into()));
        f.manager.connect();

        assert_eq!(f.manager.state(), ConnectionState::Disconnected);
        assert!(!f.manager.is_retry_pending());
        assert_eq!(
            f.recorder.events(),
            vec![
                Event::Connecting,
                Event::Disconnected("authentication rejected: bad credentials".into())
            ]
        );
    }

    #[test]
    fn test_auth_no_response_schedules_retry() {
        let f = fixture(test_config());
        f.connector.fail_next_auth(AuthError::NoResponse);
        f.manager.connect();

        assert_eq!(f.manager.state(), ConnectionState::WaitingForRetry);
        assert!(f.manager.is_retry_pending());

        thread::sleep(Duration::from_millis(200));
        assert!(f.manager.is_connected());
    }

    #[test]
    fn test_disconnect_while_waiting_for_retry_cancels_timer() {
        let f = fixture(test_config());
        f.connector
            .fail_next_open(ConnectError::Transient("timeout".into()));
        f.manager.connect();
        assert!(f.manager.is_retry_pending());

        f.manager.disconnect();
        assert_eq!(f.manager.state(), ConnectionState::Disconnected);
        assert!(!f.manager.is_retry_pending());

        // The superseded timer must never fire.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(f.manager.state(), ConnectionState::Disconnected);
        assert_eq!(f.connector.open_count(), 1);
    }

    #[test]
    fn test_requesting_current_state_is_a_noop() {
        let f = fixture(test_config());
        f.manager.connect();
        let events_before = f.recorder.events();
        let session = f.connector.last_session().unwrap();

        f.manager.connect();

        assert_eq!(f.recorder.events(), events_before);
        assert_eq!(f.connector.open_count(), 1);
        assert_eq!(session.announcements().len(), 1);
    }

    #[test]
    fn test_disconnect_tears_down_and_notifies_in_order() {
        let f = fixture(test_config());
        f.manager.connect();
        f.manager.disconnect();

        let session = f.connector.last_session().unwrap();
        assert!(!session.is_open());
        assert!(f.manager.session_handle().current().is_none());
        assert_eq!(
            f.recorder.events(),
            vec![
                Event::Connecting,
                Event::NewSession,
                Event::Connected,
                Event::Disconnecting,
                Event::Disconnected(String::new()),
                Event::SessionClosed,
            ]
        );
    }

    #[test]
    fn test_failed_connected_fanout_reuses_session_on_retry() {
        let f = fixture(test_config());
        f.recorder.fail_next_connected();
        f.manager.connect();

        assert_eq!(f.manager.state(), ConnectionState::WaitingForRetry);

        thread::sleep(Duration::from_millis(200));
        assert!(f.manager.is_connected());
        // The open, authenticated session was kept; no second open and no
        // second new_session notification.
        assert_eq!(f.connector.open_count(), 1);
        let new_sessions = f
            .recorder
            .events()
            .iter()
            .filter(|e| **e == Event::NewSession)
            .count();
        assert_eq!(new_sessions, 1);
    }

    #[test]
    fn test_connectivity_loss_closes_session_and_waits() {
        let f = fixture(test_config());
        f.manager.connect();

        f.manager.connectivity_changed(false, false);
        assert_eq!(f.manager.state(), ConnectionState::WaitingForNetwork);
        let session = f.connector.last_session().unwrap();
        assert!(!session.is_open());

        f.manager.connectivity_changed(true, false);
        assert!(f.manager.is_connected());
        assert_eq!(f.connector.open_count(), 2);
    }

    #[test]
    fn test_network_type_change_forces_reconnect() {
        let f = fixture(test_config());
        f.manager.connect();

        f.manager.connectivity_changed(true, true);
        assert!(f.manager.is_connected());
        assert_eq!(f.connector.open_count(), 2);
    }

    #[test]
    fn test_waiting_for_network_to_disconnected_sets_state_only() {
        let f = fixture_with(test_config(), Arc::new(SwitchedConnectivity::new(false)));
        f.manager.connect();
        f.manager.disconnect();

        assert_eq!(f.manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            f.recorder.events(),
            vec![
                Event::WaitingForNetwork,
                Event::Disconnected(String::new())
            ]
        );
    }

    #[test]
    #[should_panic(expected = "illegal connection state transition")]
    fn test_unlisted_transition_pair_faults() {
        let f = fixture(test_config());
        // Force a state that no request may be dispatched from.
        f.manager.shared.lock_machine().state = ConnectionState::Connecting;
        ManagerShared::submit(&f.manager.shared, Request::Connect);
    }
}
