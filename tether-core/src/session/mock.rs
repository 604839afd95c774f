// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Session
//!
//! In-memory session and connector for tests. The mock records everything
//! sent through it, lets tests script open/authentication failures, and can
//! push inbound presence and message events through the sink it was opened
//! with.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::addressing::{FullAddress, PeerId};
use crate::settings::SessionConfig;

use super::error::{AuthError, ConnectError, SessionError};
use super::{Session, SessionConnector, SessionResult, SessionSink, SubscriptionState};

/// A message captured by the mock session.
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Destinations the message was addressed to.
    pub destinations: Vec<FullAddress>,
    /// Message body.
    pub content: String,
}

#[derive(Default)]
struct MockSessionState {
    open: bool,
    authenticated: bool,
    auth_outcomes: VecDeque<Result<(), AuthError>>,
    /// `None` means sends always succeed; `Some(n)` lets n sends succeed
    /// before failing the rest.
    sends_before_failure: Option<usize>,
    probe_fails: bool,
    sent: Vec<SentMessage>,
    announcements: Vec<Option<String>>,
    subscriptions: HashMap<PeerId, SubscriptionState>,
    subscription_requests: Vec<PeerId>,
    subscription_grants: Vec<PeerId>,
}

/// Scriptable in-memory session.
pub struct MockSession {
    state: Mutex<MockSessionState>,
    sink: Mutex<Option<Arc<dyn SessionSink>>>,
}

impl MockSession {
    /// Creates an open, unauthenticated mock session.
    pub fn new() -> Self {
        MockSession {
            state: Mutex::new(MockSessionState {
                open: true,
                ..Default::default()
            }),
            sink: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockSessionState> {
        self.state.lock().expect("mock session lock poisoned")
    }

    pub(crate) fn set_sink(&self, sink: Arc<dyn SessionSink>) {
        *self.sink.lock().expect("mock sink lock poisoned") = Some(sink);
    }

    /// Queues an authentication outcome for the next `authenticate` call.
    pub fn queue_auth_outcome(&self, outcome: Result<(), AuthError>) {
        self.lock().auth_outcomes.push_back(outcome);
    }

    /// Makes every subsequent send fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.lock().sends_before_failure = if fail { Some(0) } else { None };
    }

    /// Lets `count` sends succeed, then fails the rest.
    pub fn fail_sends_after(&self, count: usize) {
        self.lock().sends_before_failure = Some(count);
    }

    /// Makes subsequent probes fail.
    pub fn set_fail_probe(&self, fail: bool) {
        self.lock().probe_fails = fail;
    }

    /// Sets the subscription relationship reported for a peer.
    pub fn set_subscription_state(&self, peer: &PeerId, state: SubscriptionState) {
        self.lock().subscriptions.insert(peer.clone(), state);
    }

    /// Returns everything sent through this session, in order.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    /// Returns the status texts of presence announcements made.
    pub fn announcements(&self) -> Vec<Option<String>> {
        self.lock().announcements.clone()
    }

    /// Returns the peers we requested a subscription from.
    pub fn subscription_requests(&self) -> Vec<PeerId> {
        self.lock().subscription_requests.clone()
    }

    /// Returns the peers we granted a subscription to.
    pub fn subscription_grants(&self) -> Vec<PeerId> {
        self.lock().subscription_grants.clone()
    }

    /// Pushes a presence change through the sink, as the server would.
    pub fn emit_presence(&self, address: &FullAddress, available: bool) {
        let sink = self.sink.lock().expect("mock sink lock poisoned").clone();
        if let Some(sink) = sink {
            sink.presence_changed(address, available);
        }
    }

    /// Pushes an inbound message through the sink, as the server would.
    pub fn emit_message(&self, from: &FullAddress, body: &str) {
        let sink = self.sink.lock().expect("mock sink lock poisoned").clone();
        if let Some(sink) = sink {
            sink.message_received(from, body);
        }
    }

    fn record_send(&self, destinations: Vec<FullAddress>, content: &str) -> SessionResult<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(SessionError::NotConnected);
        }
        match state.sends_before_failure {
            Some(0) => return Err(SessionError::SendFailed("simulated send failure".into())),
            Some(n) => state.sends_before_failure = Some(n - 1),
            None => {}
        }
        state.sent.push(SentMessage {
            destinations,
            content: content.to_string(),
        });
        Ok(())
    }
}

impl Default for MockSession {
    fn default() -> Self {
        MockSession::new()
    }
}

impl Session for MockSession {
    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }

    fn authenticate(&self, _identity: &str, _secret: &str) -> Result<(), AuthError> {
        let mut state = self.lock();
        match state.auth_outcomes.pop_front() {
            Some(Ok(())) | None => {
                state.authenticated = true;
                Ok(())
            }
            Some(Err(e)) => Err(e),
        }
    }

    fn announce_available(&self, status: Option<&str>) -> SessionResult<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(SessionError::NotConnected);
        }
        state.announcements.push(status.map(str::to_string));
        Ok(())
    }

    fn subscription_state(&self, peer: &PeerId) -> SubscriptionState {
        self.lock()
            .subscriptions
            .get(peer)
            .copied()
            .unwrap_or(SubscriptionState::None)
    }

    fn request_subscription(&self, peer: &PeerId) -> SessionResult<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(SessionError::NotConnected);
        }
        state.subscription_requests.push(peer.clone());
        Ok(())
    }

    fn grant_subscription(&self, peer: &PeerId) -> SessionResult<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(SessionError::NotConnected);
        }
        state.subscription_grants.push(peer.clone());
        Ok(())
    }

    fn send_unicast(&self, to: &FullAddress, content: &str) -> SessionResult<()> {
        self.record_send(vec![to.clone()], content)
    }

    fn send_broadcast(&self, to: &[FullAddress], content: &str) -> SessionResult<()> {
        self.record_send(to.to_vec(), content)
    }

    fn probe(&self) -> SessionResult<()> {
        let state = self.lock();
        if !state.open {
            return Err(SessionError::NotConnected);
        }
        if state.probe_fails {
            return Err(SessionError::ProbeFailed("simulated probe failure".into()));
        }
        Ok(())
    }

    fn close(&self) -> SessionResult<()> {
        let mut state = self.lock();
        state.open = false;
        state.authenticated = false;
        Ok(())
    }
}

#[derive(Default)]
struct MockConnectorState {
    open_failures: VecDeque<ConnectError>,
    auth_failures: VecDeque<AuthError>,
    opened: Vec<Arc<MockSession>>,
    open_attempts: usize,
}

/// Connector producing [`MockSession`]s, with scriptable failures.
#[derive(Default)]
pub struct MockConnector {
    state: Mutex<MockConnectorState>,
}

impl MockConnector {
    /// Creates a connector whose opens succeed.
    pub fn new() -> Self {
        MockConnector::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockConnectorState> {
        self.state.lock().expect("mock connector lock poisoned")
    }

    /// Fails the next `open` call with the given error.
    pub fn fail_next_open(&self, error: ConnectError) {
        self.lock().open_failures.push_back(error);
    }

    /// Makes the next opened session fail its first authentication.
    pub fn fail_next_auth(&self, error: AuthError) {
        self.lock().auth_failures.push_back(error);
    }

    /// Returns how many times `open` was called, including failed attempts.
    pub fn open_count(&self) -> usize {
        self.lock().open_attempts
    }

    /// Returns the most recently opened session.
    pub fn last_session(&self) -> Option<Arc<MockSession>> {
        self.lock().opened.last().cloned()
    }
}

impl SessionConnector for MockConnector {
    fn open(
        &self,
        _config: &SessionConfig,
        sink: Arc<dyn SessionSink>,
    ) -> Result<Arc<dyn Session>, ConnectError> {
        let mut state = self.lock();
        state.open_attempts += 1;
        if let Some(error) = state.open_failures.pop_front() {
            return Err(error);
        }
        let session = Arc::new(MockSession::new());
        session.set_sink(sink);
        if let Some(auth_error) = state.auth_failures.pop_front() {
            session.queue_auth_outcome(Err(auth_error));
        }
        state.opened.push(session.clone());
        Ok(session)
    }
}
