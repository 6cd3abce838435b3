//! Scheduling port
//!
//! Both schedulers arm delays through this seam instead of calling the
//! runtime directly, so tests can substitute a manually-fired timer and the
//! engine stays independent of how the host drives its timer queue.

use std::time::Duration;

/// Cancellation handle for an armed timer.
///
/// Cancellation is best-effort-prompt: a task that has already begun firing
/// when `cancel` is called may still complete.
pub struct TimerHandle {
    cancel: Box<dyn Fn() + Send + Sync>,
}

impl TimerHandle {
    pub fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    pub fn cancel(&self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TimerHandle")
    }
}

/// One-shot delayed task execution.
pub trait TimerPort: Send + Sync {
    /// Run `task` after `delay`. The returned handle aborts the pending run.
    fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle;
}

/// Tokio-backed timer: one spawned sleep task per armed notification.
pub struct TokioTimer;

impl TimerPort for TokioTimer {
    fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        let abort = handle.abort_handle();
        TimerHandle::new(move || abort.abort())
    }
}

/// Manually-driven timer for deterministic tests: collects armed tasks and
/// fires them on demand instead of sleeping.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    struct PendingTimer {
        delay: Duration,
        task: Box<dyn FnOnce() + Send>,
        cancelled: Arc<AtomicBool>,
    }

    #[derive(Default)]
    pub struct ManualTimer {
        pending: Mutex<Vec<PendingTimer>>,
    }

    impl ManualTimer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of armed, not-yet-cancelled timers.
        pub fn armed(&self) -> usize {
            self.pending
                .lock()
                .unwrap()
                .iter()
                .filter(|p| !p.cancelled.load(Ordering::SeqCst))
                .count()
        }

        /// Delays of armed, not-yet-cancelled timers.
        pub fn armed_delays(&self) -> Vec<Duration> {
            self.pending
                .lock()
                .unwrap()
                .iter()
                .filter(|p| !p.cancelled.load(Ordering::SeqCst))
                .map(|p| p.delay)
                .collect()
        }

        /// Fire every armed timer that was not cancelled, in arming order.
        pub fn fire_all(&self) {
            let drained: Vec<PendingTimer> = self.pending.lock().unwrap().drain(..).collect();
            for pending in drained {
                if !pending.cancelled.load(Ordering::SeqCst) {
                    (pending.task)();
                }
            }
        }
    }

    impl TimerPort for ManualTimer {
        fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle {
            let cancelled = Arc::new(AtomicBool::new(false));
            self.pending.lock().unwrap().push(PendingTimer {
                delay,
                task,
                cancelled: cancelled.clone(),
            });
            TimerHandle::new(move || cancelled.store(true, Ordering::SeqCst))
        }
    }
}
