// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Endpoint Settings
//!
//! Externally supplied configuration: account credentials, the allow-list of
//! authorized peers, and timing knobs. `Settings` wraps the configuration for
//! concurrent access and hands out a cached `Arc<SessionConfig>` whose pointer
//! identity tells the connection manager whether a session built from it may
//! be reused.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::addressing::PeerId;

/// Configuration errors reported before any I/O is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no account configured")]
    MissingAccount,

    #[error("no account secret configured")]
    MissingSecret,

    #[error("no authorized peer configured")]
    NoAuthorizedPeers,
}

/// Externally supplied endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Account identifier to authenticate as (bare form).
    pub account: Option<String>,
    /// Account secret.
    pub secret: Option<String>,
    /// Server host override; `None` resolves from the account domain.
    pub host: Option<String>,
    /// Server port override.
    pub port: Option<u16>,
    /// Client resource label announced to the network.
    pub resource: String,
    /// Bare identifiers allowed to issue commands and receive broadcasts.
    pub peers: Vec<String>,
    /// Client resources never targeted by broadcasts (e.g. other copies of
    /// this endpoint logged into a peer account).
    pub excluded_resources: Vec<String>,
    /// Optional status text attached to the presence announcement.
    pub status_message: Option<String>,
    /// Delay before an automatic reconnect attempt.
    pub retry_delay_ms: u64,
    /// Interval between liveness probes while connected.
    pub probe_interval_ms: u64,
    /// Reply timeout for server round-trips. Mobile networks in rural areas
    /// can take well over the usual few seconds to answer.
    pub reply_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            account: None,
            secret: None,
            host: None,
            port: None,
            resource: "tether".to_string(),
            peers: Vec::new(),
            excluded_resources: Vec::new(),
            status_message: None,
            retry_delay_ms: 10_000,
            probe_interval_ms: 30 * 60 * 1000,
            reply_timeout_ms: 2 * 60 * 1000,
        }
    }
}

impl EndpointConfig {
    /// Parses a configuration from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Everything a connector needs to open and authenticate one session.
///
/// Handed out as `Arc<SessionConfig>`; the manager compares pointer identity
/// to decide whether an existing session still matches the configuration.
pub struct SessionConfig {
    /// Account identifier to authenticate as.
    pub identity: String,
    /// Account secret, wiped from memory on drop.
    pub secret: Zeroizing<String>,
    /// Server host override.
    pub host: Option<String>,
    /// Server port override.
    pub port: Option<u16>,
    /// Client resource label.
    pub resource: String,
    /// Reply timeout for server round-trips.
    pub reply_timeout_ms: u64,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret stays out of debug output.
        f.debug_struct("SessionConfig")
            .field("identity", &self.identity)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("resource", &self.resource)
            .field("reply_timeout_ms", &self.reply_timeout_ms)
            .finish_non_exhaustive()
    }
}

/// Shared, mutable view of the endpoint configuration.
pub struct Settings {
    data: RwLock<EndpointConfig>,
    /// Session config built from the current data; invalidated by setters.
    cached: Mutex<Option<Arc<SessionConfig>>>,
}

impl Settings {
    /// Creates settings from an initial configuration.
    pub fn new(config: EndpointConfig) -> Self {
        Settings {
            data: RwLock::new(config),
            cached: Mutex::new(None),
        }
    }

    /// Checks whether the configuration is complete enough to connect.
    pub fn check_ready(&self) -> Result<(), ConfigError> {
        let data = self.read();
        if data.account.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingAccount);
        }
        if data.secret.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if data.peers.is_empty() {
            return Err(ConfigError::NoAuthorizedPeers);
        }
        Ok(())
    }

    /// Returns the session configuration, rebuilding it if a setter ran
    /// since it was last handed out. The same `Arc` is returned until then.
    pub fn session_config(&self) -> Arc<SessionConfig> {
        let mut cached = self.lock_cache();
        if let Some(config) = cached.as_ref() {
            return config.clone();
        }
        let data = self.read();
        let config = Arc::new(SessionConfig {
            identity: data.account.clone().unwrap_or_default(),
            secret: Zeroizing::new(data.secret.clone().unwrap_or_default()),
            host: data.host.clone(),
            port: data.port,
            resource: data.resource.clone(),
            reply_timeout_ms: data.reply_timeout_ms,
        });
        *cached = Some(config.clone());
        config
    }

    /// Returns the configured authorized peers, normalized.
    pub fn peers(&self) -> Vec<PeerId> {
        self.read().peers.iter().map(|p| PeerId::new(p)).collect()
    }

    /// Returns true if the given bare identifier is an authorized peer.
    pub fn is_authorized(&self, peer: &PeerId) -> bool {
        self.read()
            .peers
            .iter()
            .any(|p| PeerId::new(p) == *peer)
    }

    /// Returns true if the given client resource must not be targeted by
    /// broadcasts.
    pub fn is_excluded_resource(&self, resource: Option<&str>) -> bool {
        match resource {
            Some(res) => self
                .read()
                .excluded_resources
                .iter()
                .any(|e| e.eq_ignore_ascii_case(res)),
            None => false,
        }
    }

    /// Returns the presence status text, if configured.
    pub fn status_message(&self) -> Option<String> {
        self.read().status_message.clone()
    }

    /// Returns the delay before an automatic reconnect attempt.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.read().retry_delay_ms)
    }

    /// Returns the interval between liveness probes.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.read().probe_interval_ms)
    }

    /// Sets the account identifier.
    pub fn set_account(&self, account: &str) {
        self.write().account = Some(account.to_string());
        self.invalidate();
    }

    /// Sets the account secret.
    pub fn set_secret(&self, secret: &str) {
        self.write().secret = Some(secret.to_string());
        self.invalidate();
    }

    /// Replaces the authorized peer list.
    pub fn set_peers(&self, peers: Vec<String>) {
        self.write().peers = peers;
        self.invalidate();
    }

    /// Adds one authorized peer.
    pub fn add_peer(&self, peer: &str) {
        self.write().peers.push(peer.to_string());
        self.invalidate();
    }

    /// Sets the presence status text.
    pub fn set_status_message(&self, message: Option<String>) {
        self.write().status_message = message;
    }

    fn invalidate(&self) {
        *self.lock_cache() = None;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EndpointConfig> {
        self.data.read().expect("settings lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EndpointConfig> {
        self.data.write().expect("settings lock poisoned")
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<Arc<SessionConfig>>> {
        self.cached.lock().expect("settings cache lock poisoned")
    }
}
