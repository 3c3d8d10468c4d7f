//! Simulated diode-less switch matrix driven by a scenario script.
//!
//! The real [`KbdMatrix`] worker runs against [`VirtualMatrix`]. Sensing is
//! electrical: a driven column reaches every row connected to it through
//! closed switches, including paths that hop through other columns, so
//! pressing three corners of a rectangle lights up the fourth.

use std::cell::{Cell, RefCell};
use std::num::Wrapping;

use anyhow::{anyhow, Result};
use embassy_futures::block_on;
use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Instant;
use kbd_matrix::{
    ColumnDrive, Config, Cycles, KbdMatrix, KeyEvent, MatrixApi, Row, Timebase, WakeGate,
};
use log::debug;

use crate::script::Script;

/// Microseconds since the simulation started.
pub trait Uptime {
    fn uptime_us(&self) -> u64;
}

/// Virtual 1 MHz clock. Waiting moves time forward instantly.
#[derive(Debug, Default)]
pub struct SimTimebase {
    now_us: Cell<u64>,
}

impl SimTimebase {
    /// Start with the 32-bit cycle counter at `cycles`, to exercise wraps.
    #[cfg(test)]
    pub fn starting_at(cycles: u32) -> Self {
        Self {
            now_us: Cell::new(u64::from(cycles)),
        }
    }

    fn advance(&self, us: u32) {
        self.now_us.set(self.now_us.get() + u64::from(us));
    }
}

impl Timebase for SimTimebase {
    fn now(&self) -> Cycles {
        Wrapping(self.now_us.get() as u32)
    }

    fn cycles_to_us_floor(&self, cycles: Cycles) -> u32 {
        cycles.0
    }

    fn busy_wait_us(&self, us: u32) {
        self.advance(us);
    }

    async fn sleep_us(&self, us: u32) {
        self.advance(us);
    }
}

/// Uptime of a [`SimTimebase`] relative to where it started.
pub struct SimUptime<'a> {
    timebase: &'a SimTimebase,
    origin: u64,
}

impl<'a> SimUptime<'a> {
    pub fn new(timebase: &'a SimTimebase) -> Self {
        Self {
            timebase,
            origin: timebase.now_us.get(),
        }
    }
}

impl Uptime for SimUptime<'_> {
    fn uptime_us(&self) -> u64 {
        self.timebase.now_us.get() - self.origin
    }
}

/// Wall-clock uptime on the embassy time driver.
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Uptime for WallClock {
    fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros()
    }
}

/// Rows reachable from the driven columns through closed switches.
pub fn sense(switches: &[Row], drive: ColumnDrive) -> Row {
    let mut cols: u64 = match drive {
        ColumnDrive::Column(c) if c < switches.len() => 1 << c,
        ColumnDrive::Column(_) | ColumnDrive::None => return 0,
        ColumnDrive::All => (1u64 << switches.len()) - 1,
    };
    let mut rows: Row = 0;

    loop {
        let reached_rows = switches
            .iter()
            .enumerate()
            .filter(|(c, _)| cols & (1 << c) != 0)
            .fold(0, |acc, (_, &r)| acc | r);
        let reached_cols = switches
            .iter()
            .enumerate()
            .filter(|(_, r)| **r & reached_rows != 0)
            .fold(cols, |acc, (c, _)| acc | 1 << c);

        if reached_rows == rows && reached_cols == cols {
            return rows;
        }
        rows = reached_rows;
        cols = reached_cols;
    }
}

/// [`MatrixApi`] over the switch timeline of a [`Script`].
pub struct VirtualMatrix<'a, U> {
    script: &'a Script,
    uptime: &'a U,
    cols: usize,
    driven: ColumnDrive,
    detect: &'a Cell<bool>,
}

impl<'a, U: Uptime> VirtualMatrix<'a, U> {
    pub fn new(script: &'a Script, uptime: &'a U, cols: usize, detect: &'a Cell<bool>) -> Self {
        Self {
            script,
            uptime,
            cols,
            driven: ColumnDrive::None,
            detect,
        }
    }
}

impl<U: Uptime> MatrixApi for VirtualMatrix<'_, U> {
    fn drive_column(&mut self, drive: ColumnDrive) {
        self.driven = drive;
    }

    fn read_row(&mut self) -> Row {
        let switches = self.script.switches_at(self.uptime.uptime_us(), self.cols);
        sense(&switches, self.driven)
    }

    fn set_detect_mode(&mut self, enabled: bool) {
        self.detect.set(enabled);
    }
}

/// What came out of a simulation run.
#[derive(Debug, Default)]
pub struct Report {
    pub events: Vec<(u64, KeyEvent)>,
    pub stable: Vec<Row>,
    pub wakes: usize,
}

/// Run `script` through a [`KbdMatrix`] on `timebase`.
pub fn simulate<T, U>(script: &Script, cfg: Config, timebase: &T, uptime: &U) -> Result<Report>
where
    T: Timebase,
    U: Uptime,
{
    script.check(&cfg)?;

    let gate = WakeGate::<NoopRawMutex>::new();
    let detect = Cell::new(false);
    let events = RefCell::new(Vec::new());
    let wakes = Cell::new(0);

    let cols = cfg.col_size;
    // Give the worker time to confirm the final releases and time out
    let drain_us = u64::from(cfg.poll_timeout_ms) * 1_000
        + u64::from(cfg.debounce_up_ms.max(cfg.debounce_down_ms)) * 1_000
        + u64::from(cfg.stable_poll_period_us()) * 2;

    let hw = VirtualMatrix::new(script, uptime, cols, &detect);
    let sink = |ev: KeyEvent| {
        let at = uptime.uptime_us();
        debug!("event at {}us: {:?}", at, ev);
        events.borrow_mut().push((at, ev));
    };
    let mut matrix = KbdMatrix::new(cfg, hw, timebase, sink, &gate)
        .map_err(|e| anyhow!("invalid matrix configuration: {}", e))?;

    // Plays the role of the row interrupt: fires on a press while armed
    let keypresses = async {
        for ev in script.events.iter().filter(|ev| ev.pressed) {
            let now = uptime.uptime_us();
            if ev.at_us < now {
                continue;
            }
            sleep_long(timebase, ev.at_us - now).await;

            if detect.get() {
                debug!("wake at {}us", uptime.uptime_us());
                wakes.set(wakes.get() + 1);
                gate.signal();
                yield_now().await;
            }
        }

        let until = script.end_us + drain_us;
        let now = uptime.uptime_us();
        if until > now {
            sleep_long(timebase, until - now).await;
        }
    };

    match block_on(select(matrix.run(), keypresses)) {
        Either::First(never) => never,
        Either::Second(()) => {}
    }

    let stable = matrix.stable_state().to_vec();
    drop(matrix);

    Ok(Report {
        events: events.into_inner(),
        stable,
        wakes: wakes.get(),
    })
}

async fn sleep_long<T: Timebase>(timebase: &T, mut us: u64) {
    while us > 0 {
        let step = us.min(u64::from(u32::MAX));
        timebase.sleep_us(step as u32).await;
        us -= step;
    }
}
