//! Waiting for the service to reach a target run state.
//!
//! Polling is a blocking loop on the calling thread with a fixed cadence.
//! The deadline is only checked between probes, so a bounded wait can
//! overshoot its timeout by at most one interval.

use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::process::{ProbeError, StateProbe};

/// Delay between consecutive probes.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Wait timeout applied when none is configured.
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;

/// Longest bounded wait; larger timeouts are clamped to it so that only `0`
/// means waiting forever.
pub const MAX_WAIT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Whether to wait for convergence, and for how long.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    /// Poll until convergence instead of probing once.
    pub enabled: bool,
    /// Upper bound on the wait in seconds; `0` waits forever.
    pub timeout_seconds: u64,
}

impl WaitPolicy {
    /// Policy that probes once and returns.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            timeout_seconds: DEFAULT_WAIT_TIMEOUT_SECS,
        }
    }

    /// Policy that waits up to `timeout_seconds`, or forever when it is `0`.
    #[must_use]
    pub const fn waiting(timeout_seconds: u64) -> Self {
        Self {
            enabled: true,
            timeout_seconds,
        }
    }

    /// Returns the bounded timeout, clamped to [`MAX_WAIT`], or `None` for
    /// an infinite wait.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_seconds == 0 {
            None
        } else if self.timeout_seconds > MAX_WAIT.as_secs() {
            Some(MAX_WAIT)
        } else {
            Some(Duration::from_secs(self.timeout_seconds))
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Result of waiting for a target state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Convergence {
    /// The target state was observed.
    pub converged: bool,
    /// The deadline passed before the target state was observed.
    pub timed_out: bool,
}

/// Repeatedly probes until the service is, or is not, running.
#[derive(Clone, Debug)]
pub struct ConvergencePoller<P> {
    probe: P,
    interval: Duration,
}

impl<P: StateProbe> ConvergencePoller<P> {
    /// Creates a poller using the fixed [`POLL_INTERVAL`].
    #[must_use]
    pub const fn new(probe: P) -> Self {
        Self {
            probe,
            interval: POLL_INTERVAL,
        }
    }

    /// Replaces the poll interval. Only tests shorten it.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Waits until the observed run state equals `target_running`.
    ///
    /// With a disabled policy this is a single probe. Otherwise the probe is
    /// repeated every interval until it matches or the deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] as soon as any probe fails.
    pub fn await_state(
        &self,
        target_running: bool,
        policy: &WaitPolicy,
    ) -> Result<Convergence, ProbeError> {
        if !policy.enabled {
            let running = self.probe.is_running()?;
            return Ok(Convergence {
                converged: running == target_running,
                timed_out: false,
            });
        }

        let deadline = policy
            .timeout()
            .map(|timeout| deadline_after(Instant::now(), timeout));
        let mut attempts: u32 = 0;
        loop {
            if deadline.is_some_and(|limit| Instant::now() > limit) {
                info!(target_running, attempts, "gave up waiting for convergence");
                return Ok(Convergence {
                    converged: false,
                    timed_out: true,
                });
            }

            attempts = attempts.saturating_add(1);
            if self.probe.is_running()? == target_running {
                debug!(target_running, attempts, "converged");
                return Ok(Convergence {
                    converged: true,
                    timed_out: false,
                });
            }
            sleep(self.interval);
        }
    }
}

/// `start + timeout`, saturating so a bounded wait never becomes unbounded.
fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .or_else(|| start.checked_add(MAX_WAIT))
        .unwrap_or(start)
}
