//! Monotonic time for scan pacing and debounce windows.
//!
//! Timestamps are raw 32-bit cycle counts that wrap. They are only ever
//! compared by subtracting two of them, and [`Wrapping`] makes that
//! subtraction modular.

use core::num::Wrapping;

/// A wrapping hardware cycle count.
pub type Cycles = Wrapping<u32>;

/// Clock and delay primitives the worker runs on.
#[allow(async_fn_in_trait)]
pub trait Timebase {
    /// Current value of the free-running cycle counter.
    fn now(&self) -> Cycles;

    /// Convert a cycle delta to microseconds, rounding down.
    fn cycles_to_us_floor(&self, cycles: Cycles) -> u32;

    /// Spin for `us` microseconds without yielding. Used for the short
    /// settle delay after driving a column.
    fn busy_wait_us(&self, us: u32);

    /// Sleep for `us` microseconds, letting other work run.
    async fn sleep_us(&self, us: u32);

    /// Microseconds elapsed since `since`, wraparound-safe.
    fn elapsed_us(&self, since: Cycles) -> u32 {
        self.cycles_to_us_floor(self.now() - since)
    }
}

impl<T: Timebase + ?Sized> Timebase for &T {
    fn now(&self) -> Cycles {
        (**self).now()
    }

    fn cycles_to_us_floor(&self, cycles: Cycles) -> u32 {
        (**self).cycles_to_us_floor(cycles)
    }

    fn busy_wait_us(&self, us: u32) {
        (**self).busy_wait_us(us)
    }

    async fn sleep_us(&self, us: u32) {
        (**self).sleep_us(us).await
    }
}

/// Floor conversion of a cycle delta at `hz` cycles per second.
pub fn cycles_to_us_floor(cycles: Cycles, hz: u64) -> u32 {
    let us = u64::from(cycles.0) * 1_000_000 / hz;
    u32::try_from(us).unwrap_or(u32::MAX)
}

#[cfg(feature = "embassy-time")]
pub use self::embassy::EmbassyTimebase;

#[cfg(feature = "embassy-time")]
mod embassy {
    use core::num::Wrapping;

    use embassy_time::{block_for, Duration, Instant, Timer, TICK_HZ};

    use super::{Cycles, Timebase};

    /// [`Timebase`] on top of the embassy time driver. The tick counter is
    /// truncated to 32 bits so it wraps like a hardware cycle counter.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct EmbassyTimebase;

    impl Timebase for EmbassyTimebase {
        fn now(&self) -> Cycles {
            Wrapping(Instant::now().as_ticks() as u32)
        }

        fn cycles_to_us_floor(&self, cycles: Cycles) -> u32 {
            super::cycles_to_us_floor(cycles, TICK_HZ)
        }

        fn busy_wait_us(&self, us: u32) {
            block_for(Duration::from_micros(u64::from(us)));
        }

        async fn sleep_us(&self, us: u32) {
            Timer::after_micros(u64::from(us)).await;
        }
    }
}
