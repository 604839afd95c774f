// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message Delivery
//!
//! The outbound send path. A send is always accepted: if a usable session is
//! at hand and the destination set resolves, the message goes out directly;
//! every failure path degrades to the durable outbox instead of surfacing an
//! error. Queued messages are flushed in FIFO order after a connect and
//! whenever a peer becomes reachable again.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::addressing::FullAddress;
use crate::connection::StateListener;
use crate::roster::{AvailabilityListener, Roster};
use crate::session::{Session, SessionError, SessionHandle};
use crate::settings::Settings;
use crate::storage::{OutgoingMessage, Storage};

/// Why a direct delivery attempt did not happen or did not succeed.
#[derive(Error, Debug)]
enum DeliveryError {
    #[error("no usable session")]
    NotConnected,

    #[error("no resolvable destination")]
    NoDestination,

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Sends messages directly when possible and queues them otherwise.
pub struct Courier {
    settings: Arc<Settings>,
    roster: Arc<Roster>,
    storage: Arc<Mutex<Storage>>,
    session: SessionHandle,
    /// Serializes flush passes so a connect and a presence edge arriving
    /// together cannot deliver the same queued message twice.
    flush_gate: Mutex<()>,
}

impl Courier {
    /// Creates a courier over the shared session cell.
    pub fn new(
        settings: Arc<Settings>,
        roster: Arc<Roster>,
        storage: Arc<Mutex<Storage>>,
        session: SessionHandle,
    ) -> Self {
        Courier {
            settings,
            roster,
            storage,
            session,
            flush_gate: Mutex::new(()),
        }
    }

    /// Accepts a message for delivery. Never blocks on the network outcome:
    /// a failed or impossible direct send lands in the durable outbox.
    pub fn send(&self, content: &str, destination: Option<FullAddress>) {
        match self.try_direct(content, destination.as_ref()) {
            Ok(()) => {}
            Err(e) => {
                debug!("direct delivery unavailable ({}), queueing message", e);
                let message = OutgoingMessage::new(content, destination);
                if let Err(e) = self.lock_storage().enqueue_message(&message) {
                    error!("failed to queue outgoing message: {}", e);
                }
            }
        }
    }

    /// Flushes queued messages through the given session, oldest first.
    ///
    /// A message leaves the queue only after its send call returned without
    /// error. The first failure stops the pass so the remaining messages
    /// keep their order for the next trigger.
    pub fn flush(&self, session: &Arc<dyn Session>) {
        let _gate = self.flush_gate.lock().expect("flush gate poisoned");

        let queued = match self.lock_storage().queued_messages() {
            Ok(queued) => queued,
            Err(e) => {
                error!("cannot read outbox: {}", e);
                return;
            }
        };
        if queued.is_empty() {
            return;
        }
        debug!("flushing {} queued messages", queued.len());

        for message in queued {
            if let Err(e) = self.deliver(session, &message.content, message.destination.as_ref()) {
                warn!("flush stopped at message {}: {}", message.id, e);
                return;
            }
            if let Err(e) = self.lock_storage().remove_message(&message.id) {
                error!("failed to remove delivered message {}: {}", message.id, e);
                return;
            }
        }
    }

    fn try_direct(&self, content: &str, destination: Option<&FullAddress>) -> Result<(), DeliveryError> {
        let session = self.session.current().ok_or(DeliveryError::NotConnected)?;
        self.deliver(&session, content, destination)
    }

    fn deliver(
        &self,
        session: &Arc<dyn Session>,
        content: &str,
        destination: Option<&FullAddress>,
    ) -> Result<(), DeliveryError> {
        match destination {
            Some(destination) => session.send_unicast(destination, content)?,
            None => {
                let destinations = self.resolve_broadcast();
                if destinations.is_empty() {
                    return Err(DeliveryError::NoDestination);
                }
                session.send_broadcast(&destinations, content)?;
            }
        }
        Ok(())
    }

    /// Resolves the destination set of a broadcast.
    ///
    /// Each configured peer contributes its currently-available client
    /// addresses, minus excluded resources. A peer with no usable address
    /// contributes its bare identifier instead — presence is often still
    /// stale shortly after login, and a message parked at the server beats
    /// one that was never sent. Never both, so no peer gets the message
    /// twice.
    fn resolve_broadcast(&self) -> Vec<FullAddress> {
        let mut destinations = Vec::new();
        for peer in self.settings.peers() {
            let live: Vec<FullAddress> = self
                .roster
                .available_addresses(&peer)
                .into_iter()
                .filter(|address| !self.settings.is_excluded_resource(address.resource()))
                .collect();
            if live.is_empty() {
                destinations.push(FullAddress::bare(peer));
            } else {
                destinations.extend(live);
            }
        }
        destinations
    }

    fn lock_storage(&self) -> std::sync::MutexGuard<'_, Storage> {
        self.storage.lock().expect("storage lock poisoned")
    }
}

impl StateListener for Courier {
    fn connected(&self, session: &Arc<dyn Session>) -> Result<(), SessionError> {
        // Flush problems keep messages queued for the next trigger; they do
        // not abort the connect.
        self.flush(session);
        Ok(())
    }
}

impl AvailabilityListener for Courier {
    fn peer_available(&self) {
        if let Some(session) = self.session.current() {
            self.flush(&session);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::addressing::PeerId;
    use crate::session::MockSession;
    use crate::settings::EndpointConfig;

    use super::*;

    struct Fixture {
        courier: Courier,
        roster: Arc<Roster>,
        storage: Arc<Mutex<Storage>>,
        handle: SessionHandle,
    }

    fn fixture(peers: &[&str], excluded: &[&str]) -> Fixture {
        let config = EndpointConfig {
            account: Some("endpoint@example.org".into()),
            secret: Some("hunter2".into()),
            peers: peers.iter().map(|p| p.to_string()).collect(),
            excluded_resources: excluded.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        };
        let settings = Arc::new(Settings::new(config));
        let roster = Arc::new(Roster::new(settings.clone()));
        let storage = Arc::new(Mutex::new(Storage::in_memory().unwrap()));
        let handle = SessionHandle::new();
        let courier = Courier::new(settings, roster.clone(), storage.clone(), handle.clone());
        Fixture {
            courier,
            roster,
            storage,
            handle,
        }
    }

    fn queued_contents(storage: &Arc<Mutex<Storage>>) -> Vec<String> {
        storage
            .lock()
            .unwrap()
            .queued_messages()
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect()
    }

    fn live_session(f: &Fixture) -> Arc<MockSession> {
        let mock = Arc::new(MockSession::new());
        f.handle.set(Some(mock.clone()));
        mock
    }

    #[test]
    fn test_send_without_session_queues_durably() {
        let f = fixture(&["operator@example.org"], &[]);
        f.courier.send("status update", None);

        assert_eq!(queued_contents(&f.storage), vec!["status update"]);
    }

    #[test]
    fn test_broadcast_mixes_live_and_bare_addresses() {
        let f = fixture(&["alice@example.org", "bob@example.org"], &[]);
        let session = live_session(&f);
        f.roster
            .presence_changed(&FullAddress::parse("alice@example.org/phone"), true);

        f.courier.send("hello", None);

        let sent = session.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].destinations,
            vec![
                FullAddress::parse("alice@example.org/phone"),
                FullAddress::bare(PeerId::new("bob@example.org")),
            ]
        );
        assert!(queued_contents(&f.storage).is_empty());
    }

    #[test]
    fn test_excluded_resource_falls_back_to_bare() {
        let f = fixture(&["alice@example.org"], &["tether"]);
        let session = live_session(&f);
        f.roster
            .presence_changed(&FullAddress::parse("alice@example.org/tether"), true);

        f.courier.send("hello", None);

        let sent = session.sent_messages();
        assert_eq!(
            sent[0].destinations,
            vec![FullAddress::bare(PeerId::new("alice@example.org"))]
        );
    }

    #[test]
    fn test_explicit_destination_is_unicast() {
        let f = fixture(&["alice@example.org", "bob@example.org"], &[]);
        let session = live_session(&f);
        f.roster
            .presence_changed(&FullAddress::parse("bob@example.org/desk"), true);

        let dest = FullAddress::parse("alice@example.org/phone");
        f.courier.send("just for alice", Some(dest.clone()));

        let sent = session.sent_messages();
        assert_eq!(sent[0].destinations, vec![dest]);
    }

    #[test]
    fn test_failed_send_is_queued_not_dropped() {
        let f = fixture(&["alice@example.org"], &[]);
        let session = live_session(&f);
        session.set_fail_sends(true);
        f.roster
            .presence_changed(&FullAddress::parse("alice@example.org/phone"), true);

        f.courier.send("hello", None);

        assert!(session.sent_messages().is_empty());
        assert_eq!(queued_contents(&f.storage), vec!["hello"]);
    }

    #[test]
    fn test_flush_delivers_fifo_and_empties_queue() {
        let f = fixture(&["alice@example.org"], &[]);
        f.courier.send("first", None);
        f.courier.send("second", None);

        let session = live_session(&f);
        let session_dyn: Arc<dyn Session> = session.clone();
        f.courier.flush(&session_dyn);

        let sent: Vec<String> = session
            .sent_messages()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(sent, vec!["first", "second"]);
        assert!(queued_contents(&f.storage).is_empty());
    }

    #[test]
    fn test_flush_failure_preserves_ordered_suffix() {
        let f = fixture(&["alice@example.org"], &[]);
        f.courier.send("first", None);
        f.courier.send("second", None);
        f.courier.send("third", None);

        let session = live_session(&f);
        session.fail_sends_after(1);
        let session_dyn: Arc<dyn Session> = session.clone();
        f.courier.flush(&session_dyn);

        let sent: Vec<String> = session
            .sent_messages()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(sent, vec!["first"]);
        assert_eq!(queued_contents(&f.storage), vec!["second", "third"]);

        // The next trigger picks the suffix up in order.
        session.set_fail_sends(false);
        f.courier.flush(&session_dyn);
        assert!(queued_contents(&f.storage).is_empty());
    }

    #[test]
    fn test_peer_available_triggers_flush() {
        let f = fixture(&["alice@example.org"], &[]);
        f.courier.send("parked", None);

        let session = live_session(&f);
        f.courier.peer_available();

        assert_eq!(session.sent_messages().len(), 1);
        assert!(queued_contents(&f.storage).is_empty());
    }
}
