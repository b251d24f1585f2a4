//! Deferred callback facility.
//!
//! The state machine arms its cooldown through a [`DeferredScheduler`]:
//! `schedule_after(delay, callback)` returns a [`TimerHandle`] that can be
//! cancelled until the callback starts running. [`TokioScheduler`] is the
//! runtime-backed implementation; it captures a runtime [`Handle`] so timers
//! can be armed from interrupt threads that are not runtime workers.

use kiosk_core::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Work run once when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a scheduler-specific identifier.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Schedules callbacks after a relative delay.
pub trait DeferredScheduler: Send + Sync {
    /// Run `callback` once after `delay`.
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancel a scheduled callback.
    ///
    /// Returns `true` if the callback was still pending. Cancelling a timer
    /// that already fired or was already cancelled is a no-op.
    fn cancel(&self, handle: TimerHandle) -> bool;

    /// Number of callbacks scheduled but not yet started.
    fn pending(&self) -> usize;
}

type PendingTimers = Arc<Mutex<HashMap<u64, AbortHandle>>>;

fn lock(timers: &Mutex<HashMap<u64, AbortHandle>>) -> MutexGuard<'_, HashMap<u64, AbortHandle>> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`DeferredScheduler`] backed by tokio timers.
///
/// Each timer is a spawned task sleeping for the delay. A timer leaves the
/// pending set the moment it starts running, so `cancel` never races a
/// callback that is halfway through.
///
/// # Examples
///
/// ```
/// use kiosk_feedback::scheduler::{DeferredScheduler, TokioScheduler};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> kiosk_core::Result<()> {
///     let scheduler = TokioScheduler::current()?;
///     let handle = scheduler.schedule_after(Duration::from_secs(60), Box::new(|| {}));
///
///     assert_eq!(scheduler.pending(), 1);
///     assert!(scheduler.cancel(handle));
///     assert!(!scheduler.cancel(handle));
///     assert_eq!(scheduler.pending(), 0);
///     Ok(())
/// }
/// ```
pub struct TokioScheduler {
    runtime: Handle,
    timers: PendingTimers,
    next_id: AtomicU64,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a scheduler on the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns `Error::Runtime` when called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("No tokio runtime available: {e}")))?;
        Ok(Self::new(runtime))
    }
}

impl DeferredScheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = self.timers.clone();

        // Hold the lock across spawn so the task cannot look itself up
        // before it is registered.
        let mut pending = lock(&self.timers);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if lock(&timers).remove(&id).is_some() {
                callback();
            }
        });
        pending.insert(id, task.abort_handle());

        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        match lock(&self.timers).remove(&handle.0) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> usize {
        lock(&self.timers).len()
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
