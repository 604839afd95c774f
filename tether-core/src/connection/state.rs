// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection state.

use std::fmt;

/// Lifecycle state of the managed connection.
///
/// Exactly one value is current at any time; the connection manager is the
/// sole writer. Other components observe changes through
/// [`StateListener`](super::StateListener) callbacks, never by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to be.
    Disconnected,
    /// A connect attempt is in progress.
    Connecting,
    /// Authenticated session established.
    Connected,
    /// Session teardown in progress.
    Disconnecting,
    /// No usable network; connects resume on a connectivity event.
    WaitingForNetwork,
    /// A reconnect timer is armed after a transient failure.
    WaitingForRetry,
}

impl ConnectionState {
    /// Short human-readable description, used in status reporting.
    pub fn describe(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::WaitingForNetwork => "waiting for data connection",
            ConnectionState::WaitingForRetry => "waiting for connection retry",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
