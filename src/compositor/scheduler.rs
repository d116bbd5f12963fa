//! Tick scheduling
//!
//! The compositor never drives itself: after each tick it asks a
//! [`TickScheduler`] for exactly one more callback, the same way a display
//! refresh callback is requested once per frame. Schedulers can be timer
//! driven ([`IntervalScheduler`]) or stepped by hand ([`ManualScheduler`]).

use super::types::CompositorError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;

/// Work to run on the next tick
pub type TickCallback = Box<dyn FnOnce() + Send + 'static>;

/// Source of tick callbacks
pub trait TickScheduler: Send + Sync {
    /// Run `callback` once, at the next tick
    fn request_tick(&self, callback: TickCallback);
}

/// Shared cancellation flag checked at the top of every tick
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Scheduler stepped explicitly by its owner
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<TickCallback>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next step
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every callback queued before this call
    ///
    /// Callbacks requested while running are left for the next step.
    /// Returns the number of callbacks run.
    pub fn run_pending(&self) -> usize {
        let due: Vec<TickCallback> = self.queue.lock().drain(..).collect();
        let count = due.len();
        for callback in due {
            callback();
        }
        count
    }
}

impl TickScheduler for ManualScheduler {
    fn request_tick(&self, callback: TickCallback) {
        self.queue.lock().push_back(callback);
    }
}

/// Timer driven scheduler with a fixed frame interval
///
/// Deadlines advance by whole intervals from the previous deadline so the
/// loop does not drift; a late tick is run immediately rather than queued up.
pub struct IntervalScheduler {
    handle: Handle,
    interval: Duration,
    next_deadline: Mutex<Option<Instant>>,
}

impl IntervalScheduler {
    pub fn new(handle: Handle, interval: Duration) -> Self {
        Self {
            handle,
            interval,
            next_deadline: Mutex::new(None),
        }
    }

    /// Scheduler for `frame_rate` ticks per second on the current runtime
    pub fn from_frame_rate(frame_rate: u32) -> Result<Self, CompositorError> {
        let handle = Handle::try_current().map_err(|e| CompositorError::NoRuntime(e.to_string()))?;
        let fps = frame_rate.max(1);
        Ok(Self::new(handle, Duration::from_secs(1) / fps))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn next_deadline(&self) -> Instant {
        let now = Instant::now();
        let mut next = self.next_deadline.lock();
        let deadline = match *next {
            Some(previous) => {
                let candidate = previous + self.interval;
                if candidate < now {
                    now
                } else {
                    candidate
                }
            }
            None => now + self.interval,
        };
        *next = Some(deadline);
        deadline
    }
}

impl TickScheduler for IntervalScheduler {
    fn request_tick(&self, callback: TickCallback) {
        let deadline = self.next_deadline();
        self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            callback();
        });
    }
}
