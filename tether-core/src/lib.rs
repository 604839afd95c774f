// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tether Core Library
//!
//! Persistent remote-command endpoint over a federated messaging network.
//! Keeps one authenticated session alive across flaky connectivity, queues
//! outbound messages durably while offline, and hands inbound commands from
//! allow-listed peers to the embedded handler.
//!
//! The wire protocol is not implemented here: sessions are opened through
//! the [`SessionConnector`] trait and driven through the opaque [`Session`]
//! capability, so transports are pluggable and the lifecycle machinery is
//! testable with [`MockConnector`].

pub mod addressing;
pub mod api;
pub mod connection;
pub mod connectivity;
pub mod delivery;
pub mod roster;
pub mod session;
pub mod settings;
pub mod storage;

pub use addressing::{FullAddress, PeerId};
pub use api::{CommandHandler, Endpoint, EndpointBuilder, EndpointError, TransportStatus};
pub use connection::{ConnectionManager, ConnectionState, StateListener};
pub use connectivity::{AlwaysOnline, ConnectivityMonitor, SwitchedConnectivity};
pub use delivery::Courier;
pub use roster::Roster;
pub use session::{
    AuthError, ConnectError, MockConnector, MockSession, Session, SessionConnector, SessionError,
    SessionSink, SubscriptionState,
};
pub use settings::{ConfigError, EndpointConfig, Settings};
pub use storage::{OutgoingMessage, Storage, StorageError};
