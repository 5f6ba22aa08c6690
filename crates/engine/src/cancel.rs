use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use log::warn;

/// Longest uninterrupted sleep while waiting out a backoff.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Run-wide cancellation flag. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// The shared flag, for `signal_hook::flag::register`.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Cancel the token once `timeout` passes, unless the returned guard is
    /// dropped first.
    pub fn cancel_after(&self, timeout: Duration) -> Watchdog {
        let (done_tx, done_rx) = channel::bounded::<()>(0);
        let token = self.clone();

        let handle = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                warn!("[dispatch] run timeout of {timeout:?} reached; cancelling");
                token.cancel();
            }
        });

        Watchdog {
            done: Some(done_tx),
            handle: Some(handle),
        }
    }
}

/// Guard for [`CancelToken::cancel_after`]. Dropping it disarms the timer.
pub struct Watchdog {
    done: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        // Disconnecting wakes the timer thread.
        drop(self.done.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;
