//! Wake signal that moves the worker from armed to active polling.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

/// Single-permit wake signal.
///
/// Raised from the keypress interrupt or from [`WakeGate::start_polling`].
/// Any number of raises before the worker consumes one collapse into a
/// single wake. Place it in a `static` and hand the worker a reference.
pub struct WakeGate<M: RawMutex> {
    signal: Signal<M, ()>,
}

impl<M: RawMutex> WakeGate<M> {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Raise the gate. Safe to call from any context, and idempotent while
    /// a wake is already pending.
    pub fn signal(&self) {
        self.signal.signal(());
    }

    /// Request a scan even though the detection interrupt did not fire.
    pub fn start_polling(&self) {
        self.signal();
    }

    /// Wait for the gate to be raised, consuming the pending wake.
    pub async fn wait(&self) {
        self.signal.wait().await
    }

    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }
}

impl<M: RawMutex> Default for WakeGate<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};
    use embassy_futures::yield_now;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;

    #[test]
    fn test_wait_blocks_until_signalled() {
        let gate = WakeGate::<NoopRawMutex>::new();
        assert!(!gate.is_pending());

        let res = block_on(select(gate.wait(), yield_now()));
        assert!(matches!(res, Either::Second(())));

        gate.start_polling();
        assert!(gate.is_pending());
        let res = block_on(select(gate.wait(), yield_now()));
        assert!(matches!(res, Either::First(())));
        assert!(!gate.is_pending());
    }

    #[test]
    fn test_repeated_signals_collapse() {
        let gate = WakeGate::<NoopRawMutex>::new();
        gate.signal();
        gate.signal();
        gate.start_polling();

        block_on(gate.wait());

        let res = block_on(select(gate.wait(), yield_now()));
        assert!(matches!(res, Either::Second(())));
    }
}
