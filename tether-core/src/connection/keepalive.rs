// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Liveness Probing
//!
//! Periodically round-trips a probe over the active session. A failed probe
//! means the link is assumed half-open and unusable, so the response is a
//! forced reconnect, not another retry of the probe. Probing is armed only
//! between `connected` and `disconnected`.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::session::{Session, SessionError};

use super::StateListener;

/// Target for the forced reconnect after a failed probe.
///
/// Implementations queue the request; they must not drive the transition on
/// the probing thread's behalf synchronously through listener callbacks.
pub trait ReconnectRequester: Send + Sync {
    /// Requests a disconnect followed by a connect.
    fn request_reconnect(&self, reason: &str);
}

#[derive(Default)]
struct ProbeSlot {
    target: Option<Arc<dyn Session>>,
    shutdown: bool,
}

struct KeepaliveInner {
    interval: Duration,
    requester: Arc<dyn ReconnectRequester>,
    slot: Mutex<ProbeSlot>,
    tick: Condvar,
}

/// Periodic liveness prober.
pub struct Keepalive {
    inner: Arc<KeepaliveInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Keepalive {
    /// Creates a prober with the given interval. Idle until a session is
    /// handed to it via the `connected` callback.
    pub fn new(interval: Duration, requester: Arc<dyn ReconnectRequester>) -> Self {
        let inner = Arc::new(KeepaliveInner {
            interval,
            requester,
            slot: Mutex::new(ProbeSlot::default()),
            tick: Condvar::new(),
        });

        let worker_inner = inner.clone();
        let worker = thread::Builder::new()
            .name("liveness-probe".into())
            .spawn(move || run_prober(&worker_inner))
            .expect("failed to spawn liveness probe thread");

        Keepalive {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    fn activate(&self, session: Arc<dyn Session>) {
        let mut slot = self.lock_slot();
        slot.target = Some(session);
        self.inner.tick.notify_all();
    }

    fn deactivate(&self) {
        let mut slot = self.lock_slot();
        slot.target = None;
        self.inner.tick.notify_all();
    }

    /// Returns true while a session is being probed.
    pub fn is_active(&self) -> bool {
        self.lock_slot().target.is_some()
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, ProbeSlot> {
        self.inner.slot.lock().expect("probe slot lock poisoned")
    }
}

impl StateListener for Keepalive {
    fn connected(&self, session: &Arc<dyn Session>) -> Result<(), SessionError> {
        self.activate(session.clone());
        Ok(())
    }

    fn disconnected(&self, _reason: &str) {
        self.deactivate();
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        {
            let mut slot = self.lock_slot();
            slot.shutdown = true;
            slot.target = None;
        }
        self.inner.tick.notify_all();
        let worker = self
            .worker
            .lock()
            .expect("probe worker lock poisoned")
            .take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

fn run_prober(inner: &KeepaliveInner) {
    let mut slot = inner.slot.lock().expect("probe slot lock poisoned");
    loop {
        if slot.shutdown {
            return;
        }
        let Some(session) = slot.target.clone() else {
            slot = inner.tick.wait(slot).expect("probe slot lock poisoned");
            continue;
        };

        let (guard, timeout) = inner
            .tick
            .wait_timeout(slot, inner.interval)
            .expect("probe slot lock poisoned");
        slot = guard;
        if slot.shutdown {
            return;
        }
        if !timeout.timed_out() {
            // Woken by activate/deactivate; re-read the target.
            continue;
        }
        let unchanged = matches!(&slot.target, Some(t) if Arc::ptr_eq(t, &session));
        if !unchanged {
            continue;
        }

        drop(slot);
        match session.probe() {
            Ok(()) => debug!("liveness probe ok"),
            Err(e) => {
                warn!("liveness probe failed: {}; forcing reconnect", e);
                // Deactivate before requesting, so the failure is reported
                // exactly once; the next connected callback re-arms probing.
                {
                    let mut slot = inner.slot.lock().expect("probe slot lock poisoned");
                    slot.target = None;
                }
                inner.requester.request_reconnect("connection probe failed");
            }
        }
        slot = inner.slot.lock().expect("probe slot lock poisoned");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::session::MockSession;

    use super::*;

    #[derive(Default)]
    struct CountingRequester {
        reconnects: AtomicUsize,
    }

    impl ReconnectRequester for CountingRequester {
        fn request_reconnect(&self, _reason: &str) {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_probe_failure_forces_one_reconnect() {
        let requester = Arc::new(CountingRequester::default());
        let keepalive = Keepalive::new(Duration::from_millis(20), requester.clone());

        let session = Arc::new(MockSession::new());
        session.set_fail_probe(true);
        let session: Arc<dyn Session> = session;
        keepalive
            .connected(&session)
            .expect("activation cannot fail");

        thread::sleep(Duration::from_millis(150));
        assert_eq!(requester.reconnects.load(Ordering::SeqCst), 1);
        assert!(!keepalive.is_active());
    }

    #[test]
    fn test_no_probing_after_disconnect() {
        let requester = Arc::new(CountingRequester::default());
        let keepalive = Keepalive::new(Duration::from_millis(20), requester.clone());

        let session = Arc::new(MockSession::new());
        session.set_fail_probe(true);
        let session: Arc<dyn Session> = session;
        keepalive
            .connected(&session)
            .expect("activation cannot fail");
        keepalive.disconnected("");

        thread::sleep(Duration::from_millis(100));
        assert_eq!(requester.reconnects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_healthy_probe_keeps_session_active() {
        let requester = Arc::new(CountingRequester::default());
        let keepalive = Keepalive::new(Duration::from_millis(10), requester.clone());

        let session: Arc<dyn Session> = Arc::new(MockSession::new());
        keepalive
            .connected(&session)
            .expect("activation cannot fail");

        thread::sleep(Duration::from_millis(80));
        assert!(keepalive.is_active());
        assert_eq!(requester.reconnects.load(Ordering::SeqCst), 0);
    }
}
