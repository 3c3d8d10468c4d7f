//! Per-key time-windowed debouncing.
//!
//! A raw change on a key does not change its reported state right away.
//! The key is marked unstable and the scan cycle where the change happened
//! is remembered. Once the key has kept its raw value for the debounce
//! window (`debounce_down_ms` for presses, `debounce_up_ms` for releases)
//! it becomes stable again, and an event is emitted if the stable value
//! actually flipped. A bounce that returns to the old value before the
//! window closes is dropped silently.
//!
//! Cycle timestamps live in a small ring shared by all keys; each key only
//! stores the ring slot of the cycle that started its unstable run.

use heapless::Vec;

use crate::api::{EventSink, KeyEvent};
use crate::config::Config;
use crate::time::{Cycles, Timebase};
use crate::{Row, MAX_COLS, MAX_KEYS, SCAN_OCCURRENCES};

pub struct Debouncer {
    row_size: usize,
    debounce_down_us: u32,
    debounce_up_us: u32,
    /// Last raw snapshot that was allowed to update the debouncer.
    previous_state: Vec<Row, MAX_COLS>,
    /// Keys with a raw change still inside its debounce window.
    unstable_state: Vec<Row, MAX_COLS>,
    /// Last confirmed and reported state.
    stable_state: Vec<Row, MAX_COLS>,
    /// Ring slot where each key's unstable run began, `col * row_size + row`.
    scan_cycle_idx: Vec<u8, MAX_KEYS>,
    /// Timestamp of each recent scan cycle.
    scan_clk_cycle: [Cycles; SCAN_OCCURRENCES],
    /// Ring slot of the current scan cycle.
    scan_cycles_idx: usize,
}

impl Debouncer {
    /// Build the debounce state for a validated configuration.
    pub(crate) fn new(cfg: &Config) -> Self {
        let cols = || core::iter::repeat(0 as Row).take(cfg.col_size);

        Self {
            row_size: cfg.row_size,
            debounce_down_us: cfg.debounce_down_ms.saturating_mul(1_000),
            debounce_up_us: cfg.debounce_up_ms.saturating_mul(1_000),
            previous_state: cols().collect(),
            unstable_state: cols().collect(),
            stable_state: cols().collect(),
            scan_cycle_idx: core::iter::repeat(0)
                .take(cfg.col_size * cfg.row_size)
                .collect(),
            scan_clk_cycle: [Cycles::default(); SCAN_OCCURRENCES],
            scan_cycles_idx: 0,
        }
    }

    /// Move the ring cursor to the next slot. Called once per scan cycle,
    /// whether or not the cycle ends up updating the debouncer.
    pub fn next_cycle(&mut self) {
        self.scan_cycles_idx += 1;
        if self.scan_cycles_idx >= SCAN_OCCURRENCES {
            self.scan_cycles_idx = 0;
        }
    }

    /// Feed one raw snapshot taken at cycle count `now`.
    pub fn update<T, S>(&mut self, new_state: &[Row], now: Cycles, timebase: &T, sink: &mut S)
    where
        T: Timebase,
        S: EventSink,
    {
        self.scan_clk_cycle[self.scan_cycles_idx] = now;

        self.mark_changes(new_state);
        self.confirm(new_state, now, timebase, sink);
    }

    /// Timestamp every key whose raw value moved since the last update.
    fn mark_changes(&mut self, new_state: &[Row]) {
        let cols = self.previous_state.iter_mut().zip(&mut self.unstable_state);

        for (c, ((previous, unstable), &new)) in cols.zip(new_state).enumerate() {
            let row_changed = new ^ *previous;
            if row_changed == 0 {
                continue;
            }

            for r in 0..self.row_size {
                if row_changed & (1 << r) != 0 {
                    self.scan_cycle_idx[c * self.row_size + r] = self.scan_cycles_idx as u8;
                }
            }

            *unstable |= row_changed;
            *previous = new;
        }
    }

    /// Settle every unstable key whose window has elapsed.
    fn confirm<T, S>(&mut self, new_state: &[Row], now: Cycles, timebase: &T, sink: &mut S)
    where
        T: Timebase,
        S: EventSink,
    {
        for (c, &new) in new_state.iter().enumerate().take(self.unstable_state.len()) {
            let deb_col = self.unstable_state[c];
            if deb_col == 0 {
                continue;
            }

            for r in 0..self.row_size {
                let mask: Row = 1 << r;
                if deb_col & mask == 0 {
                    continue;
                }

                let row_bit = new & mask;
                let slot = usize::from(self.scan_cycle_idx[c * self.row_size + r]);
                let started = self.scan_clk_cycle[slot];
                let elapsed_us = timebase.cycles_to_us_floor(now - started);

                let window_us = if row_bit != 0 {
                    self.debounce_down_us
                } else {
                    self.debounce_up_us
                };
                if elapsed_us < window_us {
                    // Need more time to debounce
                    continue;
                }

                self.unstable_state[c] &= !mask;

                if self.stable_state[c] & mask == row_bit {
                    // Bounced back before the window closed
                    continue;
                }

                self.stable_state[c] ^= mask;
                sink.report(KeyEvent::new(c as u8, r as u8, row_bit != 0));
            }
        }
    }

    /// Whether any key is still inside its debounce window.
    pub fn is_unstable(&self) -> bool {
        self.unstable_state.iter().any(|&col| col != 0)
    }

    /// Confirmed key state, one mask per column.
    pub fn stable_state(&self) -> &[Row] {
        &self.stable_state
    }

    pub(crate) fn unstable_state(&self) -> &[Row] {
        &self.unstable_state
    }

    pub(crate) fn previous_state(&self) -> &[Row] {
        &self.previous_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::testing::FakeTimebase;

    /// Drives a debouncer at a fixed scan period from a function of time.
    struct Bench {
        tb: FakeTimebase,
        deb: Debouncer,
        events: std::vec::Vec<(u32, KeyEvent)>,
    }

    impl Bench {
        fn new(cfg: &Config) -> Self {
            Self {
                tb: FakeTimebase::default(),
                deb: Debouncer::new(cfg),
                events: std::vec::Vec::new(),
            }
        }

        /// Run scans at `t = start, start + period, ...` while `t < end`.
        fn run(&mut self, start: u32, end: u32, period: u32, raw: impl Fn(u32) -> std::vec::Vec<Row>) {
            let mut t = start;
            while t < end {
                self.tb.now.set(t);
                self.deb.next_cycle();
                let now = self.tb.now();
                let events = &mut self.events;
                let mut sink = |e: KeyEvent| events.push((t, e));
                self.deb.update(&raw(t), now, &self.tb, &mut sink);
                t += period;
            }
        }
    }

    #[test]
    fn test_press_confirmed_after_window() {
        let cfg = Config::new(2, 2).with_debounce_ms(5, 5);
        let mut bench = Bench::new(&cfg);

        bench.run(0, 10_000, 1_000, |_| vec![0b01, 0b00]);

        assert_eq!(bench.events, vec![(5_000, KeyEvent::new(0, 0, true))]);
        assert_eq!(bench.deb.stable_state(), &[0b01, 0b00]);
        assert!(!bench.deb.is_unstable());
    }

    #[test]
    fn test_holding_longer_emits_nothing_more() {
        let cfg = Config::new(3, 4).with_debounce_ms(5, 5);
        let mut bench = Bench::new(&cfg);

        bench.run(0, 200_000, 1_000, |_| vec![0, 0b1000, 0]);

        assert_eq!(bench.events, vec![(5_000, KeyEvent::new(1, 3, true))]);
    }

    #[test]
    fn test_bounce_is_rejected() {
        let cfg = Config::new(2, 2).with_debounce_ms(5, 5);
        let mut bench = Bench::new(&cfg);

        // Chatter for 3ms, then settle back to released
        bench.run(0, 20_000, 1_000, |t| match t {
            0 | 2_000 => vec![0b10, 0],
            _ => vec![0, 0],
        });

        assert!(bench.events.is_empty());
        assert_eq!(bench.deb.stable_state(), &[0, 0]);
        assert!(!bench.deb.is_unstable());
    }

    #[test]
    fn test_bounce_restarts_window() {
        let cfg = Config::new(1, 1).with_debounce_ms(5, 5);
        let mut bench = Bench::new(&cfg);

        // Contact chatters at 1ms, then holds from 2ms on
        bench.run(0, 20_000, 1_000, |t| match t {
            1_000 => vec![0],
            _ => vec![1],
        });

        assert_eq!(bench.events, vec![(7_000, KeyEvent::new(0, 0, true))]);
    }

    #[test]
    fn test_asymmetric_windows() {
        let cfg = Config::new(1, 2)
            .with_debounce_ms(3, 8)
            .with_poll_period_us(1_000);
        let mut bench = Bench::new(&cfg);

        bench.run(0, 40_000, 1_000, |t| if t < 20_000 { vec![0b10] } else { vec![0] });

        assert_eq!(
            bench.events,
            vec![
                (3_000, KeyEvent::new(0, 1, true)),
                (28_000, KeyEvent::new(0, 1, false)),
            ]
        );
    }

    #[test]
    fn test_keys_debounce_independently() {
        let cfg = Config::new(2, 2).with_debounce_ms(4, 4);
        let mut bench = Bench::new(&cfg);

        bench.run(0, 12_000, 1_000, |t| {
            let b = if t >= 2_000 { 0b10 } else { 0 };
            vec![0b01, b]
        });

        assert_eq!(
            bench.events,
            vec![
                (4_000, KeyEvent::new(0, 0, true)),
                (6_000, KeyEvent::new(1, 1, true)),
            ]
        );
    }

    #[test]
    fn test_window_measured_across_counter_wrap() {
        let cfg = Config::new(1, 1).with_debounce_ms(5, 5);
        let mut bench = Bench::new(&cfg);
        let start = u32::MAX - 2_499;

        bench.tb.now.set(start);
        for i in 0..10u32 {
            let now = core::num::Wrapping(start.wrapping_add(i * 1_000));
            bench.tb.now.set(now.0);
            bench.deb.next_cycle();
            let events = &mut bench.events;
            let mut sink = |e: KeyEvent| events.push((i, e));
            bench.deb.update(&[1], now, &bench.tb, &mut sink);
        }

        assert_eq!(bench.events, vec![(5, KeyEvent::new(0, 0, true))]);
    }

    #[test]
    fn test_ring_cursor_wraps() {
        let cfg = Config::new(1, 1);
        let mut deb = Debouncer::new(&cfg);
        for _ in 0..SCAN_OCCURRENCES {
            deb.next_cycle();
        }
        assert_eq!(deb.scan_cycles_idx, 0);
    }
}
