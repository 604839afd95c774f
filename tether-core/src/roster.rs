// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Authorized-Peer Roster
//!
//! Tracks the subscription handshake and presence of the configured peers.
//! On every connect the mutual presence subscription is repaired: whichever
//! half of the relationship is missing gets issued, independent of the order
//! the server processed earlier halves in.
//!
//! Presence is ephemeral. The roster keeps an in-memory snapshot of which
//! client addresses of each peer are currently available and raises a single
//! `peer_available` signal on the edge from "nobody reachable" to "at least
//! one peer reachable" — the trigger for flushing queued messages.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::addressing::{FullAddress, PeerId};
use crate::connection::StateListener;
use crate::session::{Session, SessionError, SubscriptionState};
use crate::settings::Settings;

/// Observer of the "at least one peer became reachable" edge.
pub trait AvailabilityListener: Send + Sync {
    /// At least one authorized peer just became available.
    fn peer_available(&self);
}

#[derive(Default)]
struct PresenceState {
    available: HashMap<PeerId, HashSet<FullAddress>>,
    any_available: bool,
}

/// Roster of authorized peers.
pub struct Roster {
    settings: Arc<Settings>,
    presence: Mutex<PresenceState>,
    on_available: OnceLock<Arc<dyn AvailabilityListener>>,
}

impl Roster {
    /// Creates a roster over the configured peer list.
    pub fn new(settings: Arc<Settings>) -> Self {
        Roster {
            settings,
            presence: Mutex::new(PresenceState::default()),
            on_available: OnceLock::new(),
        }
    }

    /// Installs the availability listener. May be called only once, at
    /// startup.
    pub fn set_availability_listener(&self, listener: Arc<dyn AvailabilityListener>) {
        if self.on_available.set(listener).is_err() {
            panic!("availability listener already installed");
        }
    }

    /// Returns true while at least one authorized peer is available.
    pub fn is_any_peer_available(&self) -> bool {
        self.lock_presence().any_available
    }

    /// Returns the currently available client addresses of a peer.
    pub fn available_addresses(&self, peer: &PeerId) -> Vec<FullAddress> {
        self.lock_presence()
            .available
            .get(peer)
            .map(|addresses| addresses.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Applies a presence event from the session.
    ///
    /// Events for identifiers outside the configured peer list are dropped.
    pub fn presence_changed(&self, address: &FullAddress, available: bool) {
        let peer = address.peer_id().clone();
        if !self.settings.is_authorized(&peer) {
            debug!("ignoring presence of unconfigured {}", address);
            return;
        }

        let became_available = {
            let mut presence = self.lock_presence();
            let addresses = presence.available.entry(peer).or_default();
            if available {
                addresses.insert(address.clone());
            } else {
                addresses.remove(address);
            }

            let any_now = presence.available.values().any(|a| !a.is_empty());
            let edge = !presence.any_available && any_now;
            presence.any_available = any_now;
            edge
        };

        // Notify outside the lock; the listener typically flushes the
        // outbox, which reads presence back through this roster.
        if became_available {
            debug!("an authorized peer became available");
            if let Some(listener) = self.on_available.get() {
                listener.peer_available();
            }
        }
    }

    /// Issues whichever subscription halves are missing for one peer.
    fn ensure_subscribed(
        &self,
        session: &Arc<dyn Session>,
        peer: &PeerId,
    ) -> Result<(), SessionError> {
        match session.subscription_state(peer) {
            SubscriptionState::Both => {}
            SubscriptionState::PendingIn => session.request_subscription(peer)?,
            SubscriptionState::PendingOut => session.grant_subscription(peer)?,
            SubscriptionState::None => {
                session.grant_subscription(peer)?;
                session.request_subscription(peer)?;
            }
        }
        Ok(())
    }

    fn lock_presence(&self) -> std::sync::MutexGuard<'_, PresenceState> {
        self.presence.lock().expect("presence lock poisoned")
    }
}

impl StateListener for Roster {
    fn connected(&self, session: &Arc<dyn Session>) -> Result<(), SessionError> {
        for peer in self.settings.peers() {
            self.ensure_subscribed(session, &peer)?;
        }
        Ok(())
    }

    fn disconnected(&self, _reason: &str) {
        let mut presence = self.lock_presence();
        if presence.any_available {
            debug!("marking all peers unavailable");
        }
        presence.available.clear();
        presence.any_available = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::session::MockSession;
    use crate::settings::EndpointConfig;

    use super::*;

    #[derive(Default)]
    struct CountingListener {
        signals: AtomicUsize,
    }

    impl AvailabilityListener for CountingListener {
        fn peer_available(&self) {
            self.signals.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn roster_with_peers(peers: &[&str]) -> Roster {
        let config = EndpointConfig {
            account: Some("endpoint@example.org".into()),
            secret: Some("hunter2".into()),
            peers: peers.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        };
        Roster::new(Arc::new(Settings::new(config)))
    }

    fn operator() -> PeerId {
        PeerId::new("operator@example.org")
    }

    #[test]
    fn test_unsubscribed_peer_gets_both_halves() {
        let roster = roster_with_peers(&["operator@example.org"]);
        let mock = Arc::new(MockSession::new());
        let session: Arc<dyn Session> = mock.clone();

        roster.connected(&session).unwrap();

        assert_eq!(mock.subscription_grants(), vec![operator()]);
        assert_eq!(mock.subscription_requests(), vec![operator()]);
    }

    #[test]
    fn test_one_directional_subscription_gets_complement() {
        let roster = roster_with_peers(&["operator@example.org"]);
        let mock = Arc::new(MockSession::new());
        mock.set_subscription_state(&operator(), SubscriptionState::PendingIn);
        let session: Arc<dyn Session> = mock.clone();

        roster.connected(&session).unwrap();

        assert!(mock.subscription_grants().is_empty());
        assert_eq!(mock.subscription_requests(), vec![operator()]);
    }

    #[test]
    fn test_mutual_subscription_left_alone() {
        let roster = roster_with_peers(&["operator@example.org"]);
        let mock = Arc::new(MockSession::new());
        mock.set_subscription_state(&operator(), SubscriptionState::Both);
        let session: Arc<dyn Session> = mock.clone();

        roster.connected(&session).unwrap();

        assert!(mock.subscription_grants().is_empty());
        assert!(mock.subscription_requests().is_empty());
    }

    #[test]
    fn test_availability_signal_fires_only_on_edge() {
        let roster = roster_with_peers(&["operator@example.org"]);
        let listener = Arc::new(CountingListener::default());
        roster.set_availability_listener(listener.clone());

        let phone = FullAddress::parse("operator@example.org/phone");
        let desk = FullAddress::parse("operator@example.org/desk");

        roster.presence_changed(&phone, true);
        roster.presence_changed(&desk, true);
        assert_eq!(listener.signals.load(Ordering::SeqCst), 1);
        assert!(roster.is_any_peer_available());

        // Going fully unavailable re-arms the edge.
        roster.presence_changed(&phone, false);
        roster.presence_changed(&desk, false);
        assert!(!roster.is_any_peer_available());

        roster.presence_changed(&phone, true);
        assert_eq!(listener.signals.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unconfigured_presence_is_dropped() {
        let roster = roster_with_peers(&["operator@example.org"]);
        let listener = Arc::new(CountingListener::default());
        roster.set_availability_listener(listener.clone());

        roster.presence_changed(&FullAddress::parse("mallory@example.org/x"), true);

        assert!(!roster.is_any_peer_available());
        assert_eq!(listener.signals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disconnect_marks_all_unavailable() {
        let roster = roster_with_peers(&["operator@example.org"]);
        let phone = FullAddress::parse("operator@example.org/phone");
        roster.presence_changed(&phone, true);
        assert!(roster.is_any_peer_available());

        roster.disconnected("");

        assert!(!roster.is_any_peer_available());
        assert!(roster.available_addresses(&operator()).is_empty());
    }
}
