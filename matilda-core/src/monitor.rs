//! Resource watchdog for a discovery run
//!
//! Tracks wall-clock time against a deadline and resident memory against a
//! configured ceiling. When either budget is exhausted the monitor sets a
//! single atomic cancel flag; long-running callers observe the flag at
//! candidate boundaries and before every SQL dispatch. Cancellation is
//! cooperative, idempotent, and final.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysinfo::System;
use tracing::warn;

use crate::error::CancelReason;

/// Memory is probed once per this many polls; the probe refreshes process
/// tables and is too heavy for every candidate boundary.
const MEMORY_POLL_INTERVAL: u64 = 64;

/// Cooperative memory/time watchdog
pub struct Monitor {
    cancel: Arc<AtomicBool>,
    trigger: Mutex<Option<CancelReason>>,
    started: Instant,
    deadline: Option<Instant>,
    memory_ceiling: u64,
    polls: AtomicU64,
    system: Mutex<System>,
    pid: Option<sysinfo::Pid>,
}

impl Monitor {
    /// Create a monitor with a wall-clock budget in seconds and a resident
    /// memory ceiling in bytes (0 disables the memory check)
    pub fn new(timeout_secs: f64, memory_ceiling: u64) -> Self {
        let started = Instant::now();
        let deadline = if timeout_secs > 0.0 && timeout_secs.is_finite() {
            started.checked_add(Duration::from_secs_f64(timeout_secs))
        } else {
            None
        };
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() && memory_ceiling > 0 {
            warn!("cannot determine own pid; memory ceiling will not be enforced");
        }
        Monitor {
            cancel: Arc::new(AtomicBool::new(false)),
            trigger: Mutex::new(None),
            started,
            deadline,
            memory_ceiling,
            polls: AtomicU64::new(0),
            system: Mutex::new(System::new()),
            pid,
        }
    }

    /// A monitor that never trips on its own (tests and demo paths)
    pub fn unbounded() -> Self {
        Monitor::new(0.0, 0)
    }

    /// Shared handle to the cancel flag, for query-level interrupt checks
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Whether the cancel flag is set
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// The reason the monitor tripped, if it has
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        if self.is_cancelled() {
            *self.trigger.lock()
        } else {
            None
        }
    }

    /// Trip the cancel flag. The first reason wins; later calls are no-ops.
    pub fn cancel(&self, reason: CancelReason) {
        let mut trigger = self.trigger.lock();
        if trigger.is_none() {
            *trigger = Some(reason);
            warn!(%reason, "discovery cancelled");
        }
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Check budgets; returns true when the run should stop.
    ///
    /// Called at every candidate boundary and before every SQL dispatch.
    pub fn poll(&self) -> bool {
        if self.is_cancelled() {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.cancel(CancelReason::Timeout);
                return true;
            }
        }
        if self.memory_ceiling > 0 {
            let poll = self.polls.fetch_add(1, Ordering::Relaxed);
            if poll % MEMORY_POLL_INTERVAL == 0 {
                if let Some(resident) = self.resident_memory() {
                    if resident > self.memory_ceiling {
                        self.cancel(CancelReason::Memory);
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Resident memory of this process in bytes, if the probe is available
    pub fn resident_memory(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(|p| p.memory())
    }

    /// Time elapsed since the monitor was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_trips() {
        let monitor = Monitor::unbounded();
        for _ in 0..1000 {
            assert!(!monitor.poll());
        }
        assert!(monitor.cancel_reason().is_none());
    }

    #[test]
    fn test_deadline_trips() {
        let monitor = Monitor::new(0.001, 0);
        std::thread::sleep(Duration::from_millis(5));
        assert!(monitor.poll());
        assert_eq!(monitor.cancel_reason(), Some(CancelReason::Timeout));
    }

    #[test]
    fn test_cancel_is_idempotent_and_final() {
        let monitor = Monitor::unbounded();
        monitor.cancel(CancelReason::QueryTimeouts);
        monitor.cancel(CancelReason::Memory);
        // First reason wins.
        assert_eq!(monitor.cancel_reason(), Some(CancelReason::QueryTimeouts));
        assert!(monitor.poll());
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let monitor = Monitor::unbounded();
        let flag = monitor.cancel_flag();
        assert!(!flag.load(Ordering::Relaxed));
        monitor.cancel(CancelReason::Timeout);
        assert!(flag.load(Ordering::Relaxed));
    }
}
