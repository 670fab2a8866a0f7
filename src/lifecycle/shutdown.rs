//! Cooperative stop signal for worker threads.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Cancellation flag shared between a manager and its worker.
///
/// Workers check it between loop iterations and sleep on it while backing
/// off, so a stop request also cuts a backoff wait short.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    /// Create a new, untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every waiter.
    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        let mut stopped = flag.lock().unwrap_or_else(|e| e.into_inner());
        *stopped = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for up to `timeout`. Returns `true` if the signal was raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(|e| e.into_inner());
        let (stopped, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|e| e.into_inner());
        *stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn starts_untriggered() {
        let signal = StopSignal::new();
        assert!(!signal.is_triggered());
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn trigger_is_visible_to_clones() {
        let signal = StopSignal::new();
        let other = signal.clone();
        signal.trigger();
        assert!(other.is_triggered());
        assert!(other.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn trigger_cuts_wait_short() {
        let signal = StopSignal::new();
        let waiter = signal.clone();

        let started = Instant::now();
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(50));
        signal.trigger();

        assert!(handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
