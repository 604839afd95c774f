// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Endpoint Orchestrator
//!
//! Composition root and main entry point. Assembles settings, storage, the
//! connection manager, roster, courier and liveness prober, and exposes the
//! small surface the host application drives: start, stop, send, status,
//! connectivity events and the inbound command callback.
//!
//! # Example
//!
//! ```ignore
//! use tether_core::{CommandHandler, Endpoint, EndpointConfig};
//!
//! let config = EndpointConfig {
//!     account: Some("endpoint@example.org".into()),
//!     secret: Some("secret".into()),
//!     peers: vec!["operator@example.org".into()],
//!     ..Default::default()
//! };
//!
//! let endpoint = Endpoint::builder(config)
//!     .connector(my_connector)
//!     .storage_path("/var/lib/tether/outbox.db")
//!     .command_handler(my_handler)
//!     .build()?;
//!
//! endpoint.start();
//! endpoint.send("boot complete", None);
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::addressing::FullAddress;
use crate::connection::{ConnectionManager, ConnectionState, Keepalive, StateListener};
use crate::connectivity::{AlwaysOnline, ConnectivityMonitor};
use crate::delivery::Courier;
use crate::roster::Roster;
use crate::session::{SessionConnector, SessionSink};
use crate::settings::{EndpointConfig, Settings};
use crate::storage::{Storage, StorageError};

use super::error::{EndpointError, EndpointResult};
use super::status::TransportStatus;

/// Receiver for commands issued by authorized peers.
pub trait CommandHandler: Send + Sync {
    /// Called for every message whose sender is a configured peer.
    fn handle_command(&self, command: &str, from: &FullAddress);
}

/// Routes session events: presence to the roster, messages to the command
/// handler — but only when the sender is on the allow-list. Authorization is
/// by configured identifier alone; the subscription handshake plays no role
/// here.
struct InboundRouter {
    settings: Arc<Settings>,
    roster: Arc<Roster>,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl SessionSink for InboundRouter {
    fn message_received(&self, from: &FullAddress, body: &str) {
        if body.trim().is_empty() {
            warn!("dropping empty message from {}", from);
            return;
        }
        if !self.settings.is_authorized(from.peer_id()) {
            warn!("dropping message from unconfigured sender {}", from);
            return;
        }
        debug!("command from {}", from);
        if let Some(handler) = &self.handler {
            handler.handle_command(body, from);
        }
    }

    fn presence_changed(&self, address: &FullAddress, available: bool) {
        self.roster.presence_changed(address, available);
    }
}

/// Builder for [`Endpoint`].
pub struct EndpointBuilder {
    config: EndpointConfig,
    storage_path: Option<PathBuf>,
    connector: Option<Arc<dyn SessionConnector>>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    handler: Option<Arc<dyn CommandHandler>>,
    extra_listeners: Vec<Arc<dyn StateListener>>,
}

impl EndpointBuilder {
    fn new(config: EndpointConfig) -> Self {
        EndpointBuilder {
            config,
            storage_path: None,
            connector: None,
            connectivity: Arc::new(AlwaysOnline),
            handler: None,
            extra_listeners: Vec::new(),
        }
    }

    /// Stores the outbox at the given path. Without a path the queue lives
    /// in memory and does not survive a restart.
    pub fn storage_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.storage_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the session connector. Required.
    pub fn connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the connectivity monitor. Defaults to assuming the network is
    /// always there.
    pub fn connectivity(mut self, monitor: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = monitor;
        self
    }

    /// Sets the receiver for inbound commands.
    pub fn command_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Adds an extra state listener, notified after the built-in ones.
    pub fn add_listener(mut self, listener: Arc<dyn StateListener>) -> Self {
        self.extra_listeners.push(listener);
        self
    }

    /// Wires everything together.
    pub fn build(self) -> EndpointResult<Endpoint> {
        let connector = self.connector.ok_or_else(|| {
            EndpointError::Configuration("no session connector supplied".into())
        })?;

        let settings = Arc::new(Settings::new(self.config));

        let storage = match &self.storage_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| EndpointError::Configuration(e.to_string()))?;
                }
                Storage::open(path)?
            }
            None => Storage::in_memory()?,
        };
        let storage = Arc::new(Mutex::new(storage));

        let status = Arc::new(TransportStatus::new());
        let roster = Arc::new(Roster::new(settings.clone()));

        let router = Arc::new(InboundRouter {
            settings: settings.clone(),
            roster: roster.clone(),
            handler: self.handler,
        });

        let manager = ConnectionManager::new(
            settings.clone(),
            connector,
            self.connectivity,
            router,
            status.clone(),
        );

        let courier = Arc::new(Courier::new(
            settings.clone(),
            roster.clone(),
            storage.clone(),
            manager.session_handle(),
        ));
        roster.set_availability_listener(courier.clone());

        let keepalive = Arc::new(Keepalive::new(
            settings.probe_interval(),
            Arc::new(manager.requester()),
        ));

        // Order matters: the roster re-subscribes before the courier
        // flushes, and both run before the status flips to connected.
        let mut listeners: Vec<Arc<dyn StateListener>> = vec![
            roster.clone(),
            courier.clone(),
            keepalive,
            status.clone(),
        ];
        listeners.extend(self.extra_listeners);
        manager.install_listeners(listeners);

        Ok(Endpoint {
            settings,
            storage,
            status,
            manager,
            courier,
        })
    }
}

/// A messaging-transport endpoint.
///
/// Explicitly constructed and owned by the host; create one per account.
pub struct Endpoint {
    settings: Arc<Settings>,
    storage: Arc<Mutex<Storage>>,
    status: Arc<TransportStatus>,
    manager: ConnectionManager,
    courier: Arc<Courier>,
}

impl Endpoint {
    /// Starts building an endpoint from a configuration.
    pub fn builder(config: EndpointConfig) -> EndpointBuilder {
        EndpointBuilder::new(config)
    }

    /// Brings the connection up. Never fails outright: every outcome is
    /// observable through [`request_status`](Self::request_status) and the
    /// state listeners.
    pub fn start(&self) {
        self.manager.connect();
    }

    /// Takes the connection down.
    pub fn stop(&self) {
        self.manager.disconnect();
    }

    /// Accepts a message for delivery to one peer, or to all authorized
    /// peers when `destination` is `None`. Delivery is best-effort; an
    /// undeliverable message is queued durably and flushed later.
    pub fn send(&self, content: &str, destination: Option<FullAddress>) {
        self.courier.send(content, destination);
    }

    /// Returns a human-readable description of the connection state and the
    /// last failure reason.
    pub fn request_status(&self) -> String {
        self.status.current()
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Returns true while an authenticated session is established.
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Applies a device connectivity change reported by the host platform.
    pub fn connectivity_changed(&self, available: bool, type_changed: bool) {
        self.manager.connectivity_changed(available, type_changed);
    }

    /// Returns the live settings, for reconfiguration at runtime.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Returns how many messages are waiting for delivery.
    pub fn queued_message_count(&self) -> Result<usize, StorageError> {
        self.storage
            .lock()
            .expect("storage lock poisoned")
            .queued_message_count()
    }
}
