//! Active-polling cadence.
//!
//! While awake the worker scans once per poll period. The time spent
//! scanning and debouncing is subtracted from the sleep that follows, so
//! scan starts stay one period apart. Polling stops once no row has read
//! active for `poll_timeout_ms` and no key is waiting on its debounce window.

use embassy_sync::blocking_mutex::raw::RawMutex;
use log::debug;

use crate::api::{EventSink, MatrixApi};
use crate::matrix::KbdMatrix;
use crate::time::{Cycles, Timebase};

/// Shortest sleep between two scans, so lower priority work always runs.
pub const MIN_SLEEP_US: u32 = 1_000;

/// Tracks when the matrix last showed activity.
#[derive(Debug, Clone, Copy)]
pub struct QuietDeadline {
    since: Cycles,
    timeout_us: u32,
}

impl QuietDeadline {
    pub fn start(now: Cycles, timeout_ms: u32) -> Self {
        Self {
            since: now,
            timeout_us: timeout_ms.saturating_mul(1_000),
        }
    }

    /// Push the deadline to `now` plus the timeout.
    pub fn extend(&mut self, now: Cycles) {
        self.since = now;
    }

    pub fn expired<T: Timebase>(&self, timebase: &T) -> bool {
        timebase.elapsed_us(self.since) >= self.timeout_us
    }
}

/// Sleep that keeps scan starts `period_us` apart after `elapsed_us` of
/// work, never shorter than [`MIN_SLEEP_US`] and never longer than the
/// period itself.
pub fn compensated_sleep_us(period_us: u32, elapsed_us: u32) -> u32 {
    let wait_us = period_us.saturating_sub(elapsed_us).max(MIN_SLEEP_US);

    if wait_us > period_us {
        debug!("wait_period_us: {}", wait_us);
        return period_us;
    }

    wait_us
}

impl<'g, A, T, S, M> KbdMatrix<'g, A, T, S, M>
where
    A: MatrixApi,
    T: Timebase,
    S: EventSink,
    M: RawMutex,
{
    /// Scan until the matrix has been quiet for `poll_timeout_ms`.
    pub async fn run_active_loop(&mut self) {
        let mut deadline = QuietDeadline::start(self.timebase.now(), self.config.poll_timeout_ms);

        loop {
            let start = self.timebase.now();

            if self.check_key_events() {
                deadline.extend(self.timebase.now());
            } else if !self.debouncer.is_unstable() && deadline.expired(&self.timebase) {
                // Keys mid-debounce keep the loop alive until they settle
                break;
            }

            let period_us = if self.debouncer.is_unstable() {
                self.config.poll_period_us
            } else {
                self.config.stable_poll_period_us()
            };

            let wait_us = compensated_sleep_us(period_us, self.timebase.elapsed_us(start));

            // Allow other tasks to run while we sleep
            self.timebase.sleep_us(wait_us).await;
        }
    }
}
