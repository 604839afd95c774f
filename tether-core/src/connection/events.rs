// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! State-change notifications.

use std::sync::Arc;

use crate::session::{Session, SessionError};

/// Observer of connection state transitions.
///
/// All methods default to no-ops so implementors override only what they
/// need. The listener list is assembled once at startup and never mutated
/// afterwards; callbacks run on whichever thread drives the transition.
///
/// A listener must not drive a new transition from inside a callback —
/// request it through the manager instead, which queues it until the current
/// transition has completed.
pub trait StateListener: Send + Sync {
    /// A session instance was opened that was not seen before.
    fn new_session(&self, _session: &Arc<dyn Session>) {}

    /// An authenticated session is established. Roster setup and queue
    /// flushing happen here, before the endpoint announces its presence.
    ///
    /// Returning an error aborts the transition and schedules a reconnect.
    fn connected(&self, _session: &Arc<dyn Session>) -> Result<(), SessionError> {
        Ok(())
    }

    /// A connect attempt started.
    fn connecting(&self) {}

    /// Session teardown started.
    fn disconnecting(&self) {}

    /// The connection is gone. `reason` is human-readable and may be empty.
    fn disconnected(&self, _reason: &str) {}

    /// The given session had completed a connected fan-out and is now being
    /// discarded. Runs after [`disconnected`](Self::disconnected), while the
    /// session can still be addressed for teardown work.
    fn session_closed(&self, _session: &Arc<dyn Session>) {}

    /// Waiting for a usable network.
    fn waiting_for_network(&self) {}

    /// Waiting for the reconnect timer.
    fn waiting_for_retry(&self) {}
}
