use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Shared cancellation flag whose waits wake up as soon as it is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, signal) = &*self.inner;
        let mut cancelled = flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *cancelled = true;
        signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sleeps for `duration` unless cancelled first. Returns `true` when the
    /// full delay elapsed and `false` on cancellation.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let (flag, signal) = &*self.inner;
        let mut cancelled = flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if *cancelled {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, _) = signal
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            cancelled = guard;
        }
    }
}
