// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session Abstraction
//!
//! The authenticated link to the messaging server, behind a trait so the
//! connection machinery never touches the wire protocol. Implementations own
//! framing, TLS and stanza handling; this crate only drives the lifecycle and
//! routes messages.

pub mod error;
pub mod mock;

use std::sync::{Arc, RwLock};

use crate::addressing::{FullAddress, PeerId};
use crate::settings::SessionConfig;

pub use error::{AuthError, ConnectError, SessionError};
pub use mock::{MockConnector, MockSession, SentMessage};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Presence-subscription relationship with one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No subscription in either direction.
    None,
    /// The peer sees our presence; we do not see theirs yet.
    PendingIn,
    /// We requested the peer's presence; they do not see ours yet.
    PendingOut,
    /// Mutual subscription, both directions established.
    Both,
}

/// One authenticated link to the messaging server.
///
/// Methods take `&self`; implementations are expected to synchronize
/// internally, since sends, probes and teardown arrive from different
/// threads.
pub trait Session: Send + Sync {
    /// Returns true while the transport-level link is alive.
    fn is_open(&self) -> bool;

    /// Returns true once authentication has completed on this link.
    fn is_authenticated(&self) -> bool;

    /// Authenticates the link. Blocking.
    fn authenticate(&self, identity: &str, secret: &str) -> Result<(), AuthError>;

    /// Announces this endpoint as available, with an optional status text.
    fn announce_available(&self, status: Option<&str>) -> SessionResult<()>;

    /// Returns the current subscription relationship with a peer.
    fn subscription_state(&self, peer: &PeerId) -> SubscriptionState;

    /// Asks the peer to share their presence with us.
    fn request_subscription(&self, peer: &PeerId) -> SessionResult<()>;

    /// Allows the peer to see our presence.
    fn grant_subscription(&self, peer: &PeerId) -> SessionResult<()>;

    /// Sends a message to a single destination.
    fn send_unicast(&self, to: &FullAddress, content: &str) -> SessionResult<()>;

    /// Sends one message to every listed destination.
    fn send_broadcast(&self, to: &[FullAddress], content: &str) -> SessionResult<()>;

    /// Round-trips a keepalive probe over the link.
    fn probe(&self) -> SessionResult<()>;

    /// Closes the link. The session is invalid afterwards.
    fn close(&self) -> SessionResult<()>;
}

/// Opens sessions from a configuration.
pub trait SessionConnector: Send + Sync {
    /// Opens the transport-level link and wires inbound events to `sink`.
    ///
    /// The returned session is open but not yet authenticated.
    fn open(
        &self,
        config: &SessionConfig,
        sink: Arc<dyn SessionSink>,
    ) -> Result<Arc<dyn Session>, ConnectError>;
}

/// Receiver for events pushed by a session.
///
/// Implementations must tolerate calls from arbitrary threads; session
/// implementations typically run their own reader.
pub trait SessionSink: Send + Sync {
    /// An inbound chat message arrived.
    fn message_received(&self, from: &FullAddress, body: &str);

    /// A peer client became available or unavailable.
    fn presence_changed(&self, address: &FullAddress, available: bool);
}

/// Shared cell holding the currently usable session, if any.
///
/// The connection manager is the sole writer. Readers (the send path, flush
/// triggers) take a snapshot and treat it as advisory: the session they get
/// may die a moment later, in which case the send fails and the message is
/// queued instead.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<Arc<dyn Session>>>>,
}

impl SessionHandle {
    /// Creates an empty handle.
    pub fn new() -> Self {
        SessionHandle::default()
    }

    /// Returns the current session, if one is usable.
    pub fn current(&self) -> Option<Arc<dyn Session>> {
        self.inner
            .read()
            .expect("session handle lock poisoned")
            .clone()
    }

    pub(crate) fn set(&self, session: Option<Arc<dyn Session>>) {
        *self.inner.write().expect("session handle lock poisoned") = session;
    }
}
