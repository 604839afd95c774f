// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connectivity Monitoring
//!
//! Device-level network availability, consulted before a connect attempt.
//! Platform glue reports change events through
//! [`Endpoint::connectivity_changed`](crate::api::Endpoint::connectivity_changed).

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether a usable data connection exists right now.
pub trait ConnectivityMonitor: Send + Sync {
    /// Returns true if the device currently has a data connection.
    fn is_network_available(&self) -> bool;
}

/// Monitor that always reports an available network.
///
/// For hosts without a connectivity source; the endpoint then discovers
/// outages through connect failures and probe failures instead.
#[derive(Debug, Default)]
pub struct AlwaysOnline;

impl ConnectivityMonitor for AlwaysOnline {
    fn is_network_available(&self) -> bool {
        true
    }
}

/// Monitor backed by a flag the host flips on connectivity events.
#[derive(Debug)]
pub struct SwitchedConnectivity {
    available: AtomicBool,
}

impl SwitchedConnectivity {
    /// Creates a monitor with the given initial availability.
    pub fn new(available: bool) -> Self {
        SwitchedConnectivity {
            available: AtomicBool::new(available),
        }
    }

    /// Updates the availability flag.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl ConnectivityMonitor for SwitchedConnectivity {
    fn is_network_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
