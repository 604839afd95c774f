// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reconnect Timer
//!
//! A single-slot delayed-task scheduler. At most one timer is pending at any
//! time: arming a new one supersedes the previous one, and a superseded or
//! cancelled timer never fires.

use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

/// The action to run when the timer fires.
type RetryAction = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Slot {
    deadline: Option<Instant>,
    shutdown: bool,
}

struct RetryInner {
    slot: Mutex<Slot>,
    tick: Condvar,
    action: OnceLock<RetryAction>,
}

/// Single-slot cancellable retry timer.
pub struct RetryScheduler {
    inner: Arc<RetryInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RetryScheduler {
    /// Creates an unarmed scheduler with its worker thread.
    pub fn new() -> Self {
        let inner = Arc::new(RetryInner {
            slot: Mutex::new(Slot::default()),
            tick: Condvar::new(),
            action: OnceLock::new(),
        });

        let worker_inner = inner.clone();
        let worker = thread::Builder::new()
            .name("retry-timer".into())
            .spawn(move || run_timer(&worker_inner))
            .expect("failed to spawn retry timer thread");

        RetryScheduler {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Sets the action run on firing. May be set only once, before the
    /// first `schedule` call.
    pub fn set_action<F>(&self, action: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.inner.action.set(Box::new(action)).is_err() {
            panic!("retry action already set");
        }
    }

    /// Arms the timer. A previously armed timer is superseded and will not
    /// fire.
    pub fn schedule(&self, delay: Duration) {
        debug!("scheduling reconnect in {:?}", delay);
        let mut slot = self.lock_slot();
        slot.deadline = Some(Instant::now() + delay);
        self.inner.tick.notify_all();
    }

    /// Disarms the timer. Idempotent.
    pub fn cancel(&self) {
        let mut slot = self.lock_slot();
        if slot.deadline.take().is_some() {
            debug!("cancelled pending reconnect");
        }
        self.inner.tick.notify_all();
    }

    /// Returns true while a timer is armed.
    pub fn is_armed(&self) -> bool {
        self.lock_slot().deadline.is_some()
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.inner.slot.lock().expect("retry slot lock poisoned")
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        RetryScheduler::new()
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        {
            let mut slot = self.lock_slot();
            slot.shutdown = true;
            slot.deadline = None;
        }
        self.inner.tick.notify_all();
        let worker = self
            .worker
            .lock()
            .expect("retry worker lock poisoned")
            .take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

fn run_timer(inner: &RetryInner) {
    let mut slot = inner.slot.lock().expect("retry slot lock poisoned");
    loop {
        if slot.shutdown {
            return;
        }
        match slot.deadline {
            None => {
                slot = inner.tick.wait(slot).expect("retry slot lock poisoned");
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    // Clear the slot before running so the action can arm a
                    // fresh timer.
                    slot.deadline = None;
                    drop(slot);
                    if let Some(action) = inner.action.get() {
                        action();
                    }
                    slot = inner.slot.lock().expect("retry slot lock poisoned");
                } else {
                    let (guard, _) = inner
                        .tick
                        .wait_timeout(slot, deadline - now)
                        .expect("retry slot lock poisoned");
                    slot = guard;
                }
            }
        }
    }
}
