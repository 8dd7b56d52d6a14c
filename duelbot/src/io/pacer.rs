//! Clock and wait abstraction used for pacing actions and dialog clicks.
//!
//! The [`Pacer`] trait keeps the scheduler off the wall clock. Live sessions use
//! [`ThreadPacer`], whose waits wake early when a [`StopSignal`] fires; tests use
//! a manual pacer that only advances a virtual clock.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

/// A wait was cut short because the session is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait interrupted by stop request")]
pub struct Interrupted;

pub trait Pacer {
    fn now(&self) -> Instant;

    /// Block for `duration`, returning early with [`Interrupted`] on stop.
    fn wait(&self, duration: Duration) -> Result<(), Interrupted>;

    fn is_stopped(&self) -> bool;
}

/// Cloneable stop flag shared between the session and whoever ends it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (flag, wake) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`. Returns `true` if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, wake) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }

    /// Fire the signal once `limit` has passed, unless it fired earlier.
    pub fn stop_after(&self, limit: Duration) -> JoinHandle<()> {
        let signal = self.clone();
        thread::spawn(move || {
            if !signal.wait_timeout(limit) {
                info!(
                    limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "time limit reached, stopping"
                );
                signal.stop();
            }
        })
    }
}

/// Real-time pacer backed by the monotonic clock.
#[derive(Debug, Clone, Default)]
pub struct ThreadPacer {
    stop: StopSignal,
}

impl ThreadPacer {
    pub fn new(stop: StopSignal) -> Self {
        Self { stop }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }
}

impl Pacer for ThreadPacer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wait(&self, duration: Duration) -> Result<(), Interrupted> {
        if self.stop.is_stopped() {
            return Err(Interrupted);
        }
        if duration.is_zero() {
            return Ok(());
        }
        if self.stop.wait_timeout(duration) {
            return Err(Interrupted);
        }
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_elapses_without_stop() {
        let pacer = ThreadPacer::default();
        let start = pacer.now();
        pacer.wait(Duration::from_millis(5)).expect("wait");
        assert!(pacer.now().duration_since(start) >= Duration::from_millis(5));
    }

    #[test]
    fn stop_interrupts_pending_wait() {
        let stop = StopSignal::new();
        let pacer = ThreadPacer::new(stop.clone());
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stop.stop();
        });
        let start = Instant::now();
        assert_eq!(pacer.wait(Duration::from_secs(30)), Err(Interrupted));
        assert!(start.elapsed() < Duration::from_secs(30));
        stopper.join().expect("join");
        assert!(pacer.is_stopped());
    }

    #[test]
    fn stop_after_fires_once_limit_passes() {
        let stop = StopSignal::new();
        let timer = stop.stop_after(Duration::from_millis(10));
        assert!(stop.wait_timeout(Duration::from_secs(30)));
        timer.join().expect("join");
        assert!(stop.is_stopped());
    }

    #[test]
    fn stop_after_returns_early_when_already_stopped() {
        let stop = StopSignal::new();
        let timer = stop.stop_after(Duration::from_secs(30));
        stop.stop();
        timer.join().expect("join");
        assert!(stop.is_stopped());
    }

    #[test]
    fn waits_after_stop_fail_immediately() {
        let pacer = ThreadPacer::default();
        pacer.stop_signal().stop();
        assert_eq!(pacer.wait(Duration::ZERO), Err(Interrupted));
    }
}
