//! One-shot deadline timers.
//!
//! A single timer thread serves every pending admin deadline. Firing a
//! timer triggers the request's enqueue-once with [`ErrorCode::TimedOut`];
//! the driver observes the error on its next step.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::enq_once::EnqueueOnce;
use crate::error::ErrorCode;
use crate::log::{trace, warn};
use crate::util::lock_poisoned;

/// Identifies a pending one-shot timer.
pub(crate) struct TimerHandle(u64);

struct TimerState {
    /// Armed timers by id. Removed on fire or stop.
    pending: HashMap<u64, Arc<EnqueueOnce>>,
    /// Fire order. May contain ids already removed from `pending`.
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    next_id: u64,
    shutdown: bool,
}

struct TimersShared {
    state: Mutex<TimerState>,
    cond: Condvar,
}

pub(crate) struct Timers {
    shared: Arc<TimersShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Timers {
    pub(crate) fn new() -> Timers {
        let shared = Arc::new(TimersShared {
            state: Mutex::new(TimerState {
                pending: HashMap::new(),
                deadlines: BinaryHeap::new(),
                next_id: 0,
                shutdown: false,
            }),
            cond: Condvar::new(),
        });
        let thread = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("loghub timer thread".into())
                .spawn(move || timer_loop(shared))
                .expect("Failed to start timer thread")
        };
        Timers {
            shared,
            thread: Mutex::new(Some(thread)),
        }
    }

    /// Arms a one-shot timer that triggers `eonce` after `delay`.
    pub(crate) fn start_oneshot(&self, delay: Duration, eonce: Arc<EnqueueOnce>) -> TimerHandle {
        let mut state = lock_poisoned(&self.shared.state);
        let id = state.next_id;
        state.next_id += 1;
        state.pending.insert(id, eonce);
        state.deadlines.push(Reverse((Instant::now() + delay, id)));
        self.shared.cond.notify_one();
        TimerHandle(id)
    }

    /// Stops a timer. Returns true if it had not fired yet.
    pub(crate) fn stop(&self, handle: &TimerHandle) -> bool {
        lock_poisoned(&self.shared.state)
            .pending
            .remove(&handle.0)
            .is_some()
    }

    /// Stops the timer thread. Armed timers never fire after this returns.
    pub(crate) fn shutdown(&self) {
        {
            let mut state = lock_poisoned(&self.shared.state);
            state.shutdown = true;
            state.pending.clear();
            self.shared.cond.notify_one();
        }
        if let Some(thread) = lock_poisoned(&self.thread).take() {
            if thread.join().is_err() {
                warn!("Timer thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn timer_loop(shared: Arc<TimersShared>) {
    trace!("Timer thread loop started");
    let mut state = lock_poisoned(&shared.state);
    loop {
        if state.shutdown {
            break;
        }
        let now = Instant::now();
        match state.deadlines.peek().copied() {
            None => {
                state = match shared.cond.wait(state) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
            Some(Reverse((at, id))) if at <= now => {
                state.deadlines.pop();
                if let Some(eonce) = state.pending.remove(&id) {
                    // A stopped timer leaves a stale heap entry behind;
                    // the pending map is authoritative.
                    drop(state);
                    eonce.trigger("timeout timer", ErrorCode::TimedOut, "timer timeout");
                    state = lock_poisoned(&shared.state);
                }
            }
            Some(Reverse((at, _))) => {
                let wait = at.saturating_duration_since(now);
                state = match shared.cond.wait_timeout(state, wait) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                };
            }
        }
    }
    trace!("Timer thread loop terminated");
}
