// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport Status
//!
//! Human-readable connection status for UIs and diagnostics. Tracks the
//! current state through listener callbacks and remembers the most recent
//! failure reason; it is the only failure surface callers of `start` and
//! `send` ever see.

use std::sync::{Arc, Mutex};

use crate::connection::{ConnectionState, FailureReporter, StateListener};
use crate::session::{Session, SessionError};

struct StatusInner {
    state: ConnectionState,
    last_failure: Option<String>,
}

/// Connection status, readable at any time.
pub struct TransportStatus {
    inner: Mutex<StatusInner>,
}

impl TransportStatus {
    /// Creates a status tracker starting out disconnected.
    pub fn new() -> Self {
        TransportStatus {
            inner: Mutex::new(StatusInner {
                state: ConnectionState::Disconnected,
                last_failure: None,
            }),
        }
    }

    /// Returns the current status line.
    pub fn current(&self) -> String {
        let inner = self.lock();
        match &inner.last_failure {
            Some(failure) if inner.state != ConnectionState::Connected => {
                format!("{} (last failure: {})", inner.state.describe(), failure)
            }
            _ => inner.state.describe().to_string(),
        }
    }

    /// Returns the state this tracker last observed.
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    fn set_state(&self, state: ConnectionState) {
        self.lock().state = state;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusInner> {
        self.inner.lock().expect("status lock poisoned")
    }
}

impl Default for TransportStatus {
    fn default() -> Self {
        TransportStatus::new()
    }
}

impl FailureReporter for TransportStatus {
    fn failure(&self, reason: &str) {
        self.lock().last_failure = Some(reason.to_string());
    }
}

impl StateListener for TransportStatus {
    fn connected(&self, _session: &Arc<dyn Session>) -> Result<(), SessionError> {
        let mut inner = self.lock();
        inner.state = ConnectionState::Connected;
        inner.last_failure = None;
        Ok(())
    }

    fn connecting(&self) {
        self.set_state(ConnectionState::Connecting);
    }

    fn disconnecting(&self) {
        self.set_state(ConnectionState::Disconnecting);
    }

    fn disconnected(&self, reason: &str) {
        let mut inner = self.lock();
        inner.state = ConnectionState::Disconnected;
        if !reason.is_empty() {
            inner.last_failure = Some(reason.to_string());
        }
    }

    fn waiting_for_network(&self) {
        self.set_state(ConnectionState::WaitingForNetwork);
    }

    fn waiting_for_retry(&self) {
        self.set_state(ConnectionState::WaitingForRetry);
    }
}
