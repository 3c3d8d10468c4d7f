//! Device configuration and construction-time validation.
//!
//! Everything in [`Config`] is fixed once a [`KbdMatrix`](crate::KbdMatrix)
//! is built. Geometry sizes the per-device arrays, timing drives the scan
//! cadence and the debounce windows.

use core::fmt;

use heapless::Vec;

use crate::{Row, MAX_COLS, ROW_BITS, SCAN_OCCURRENCES};

/// Default post-drive settle delay.
pub const DEFAULT_SETTLE_TIME_US: u32 = 50;
/// Default press confirmation window.
pub const DEFAULT_DEBOUNCE_DOWN_MS: u32 = 10;
/// Default release confirmation window.
pub const DEFAULT_DEBOUNCE_UP_MS: u32 = 20;
/// Default active scan period.
pub const DEFAULT_POLL_PERIOD_US: u32 = 5_000;
/// Default quiet time before going back to sleep.
pub const DEFAULT_POLL_TIMEOUT_MS: u32 = 100;

/// Matrix geometry, timing and feature flags for one device instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of driven columns.
    pub col_size: usize,
    /// Number of sensed rows, one bit each in a [`Row`] mask.
    pub row_size: usize,
    /// Busy-wait after driving a column, before sampling the rows.
    pub settle_time_us: u32,
    /// Minimum time a press must be stable before it is reported.
    pub debounce_down_ms: u32,
    /// Minimum time a release must be stable before it is reported.
    pub debounce_up_ms: u32,
    /// Scan period while any key is mid-debounce.
    pub poll_period_us: u32,
    /// Scan period while every key is settled. `None` uses `poll_period_us`.
    pub stable_poll_period_us: Option<u32>,
    /// How long the matrix must be quiet before the worker re-arms.
    pub poll_timeout_ms: u32,
    /// Run the ghosting detector on every scan.
    pub ghostkey_check: bool,
    /// Per-column masks of key positions that physically exist.
    pub actual_key_mask: Option<Vec<Row, MAX_COLS>>,
}

/// Reasons a [`Config`] is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `col_size` is zero or larger than [`MAX_COLS`].
    ColumnCount(usize),
    /// `row_size` is zero or larger than [`ROW_BITS`].
    RowCount(usize),
    /// `poll_period_us` is zero.
    ZeroPollPeriod,
    /// `stable_poll_period_us` is shorter than `poll_period_us`.
    StablePollPeriod { stable_us: u32, period_us: u32 },
    /// The longest debounce window spans too many scan cycles for the
    /// timestamp ring.
    DebounceWindowTooLong { cycles: u32, max: u32 },
    /// `actual_key_mask` does not have one entry per column.
    KeyMaskLength { expected: usize, got: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ColumnCount(n) => {
                write!(f, "column count {} out of range 1..={}", n, MAX_COLS)
            }
            ConfigError::RowCount(n) => {
                write!(f, "row count {} out of range 1..={}", n, ROW_BITS)
            }
            ConfigError::ZeroPollPeriod => write!(f, "poll period must be non-zero"),
            ConfigError::StablePollPeriod {
                stable_us,
                period_us,
            } => write!(
                f,
                "stable poll period {}us is shorter than poll period {}us",
                stable_us, period_us
            ),
            ConfigError::DebounceWindowTooLong { cycles, max } => write!(
                f,
                "debounce window spans {} scan cycles, ring holds {}",
                cycles, max
            ),
            ConfigError::KeyMaskLength { expected, got } => write!(
                f,
                "actual key mask has {} columns, expected {}",
                got, expected
            ),
        }
    }
}

impl Config {
    /// Configuration for a `col_size` x `row_size` matrix with default timing.
    pub fn new(col_size: usize, row_size: usize) -> Self {
        Self {
            col_size,
            row_size,
            settle_time_us: DEFAULT_SETTLE_TIME_US,
            debounce_down_ms: DEFAULT_DEBOUNCE_DOWN_MS,
            debounce_up_ms: DEFAULT_DEBOUNCE_UP_MS,
            poll_period_us: DEFAULT_POLL_PERIOD_US,
            stable_poll_period_us: None,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            ghostkey_check: true,
            actual_key_mask: None,
        }
    }

    pub fn with_settle_time_us(mut self, us: u32) -> Self {
        self.settle_time_us = us;
        self
    }

    pub fn with_debounce_ms(mut self, down_ms: u32, up_ms: u32) -> Self {
        self.debounce_down_ms = down_ms;
        self.debounce_up_ms = up_ms;
        self
    }

    pub fn with_poll_period_us(mut self, us: u32) -> Self {
        self.poll_period_us = us;
        self
    }

    pub fn with_stable_poll_period_us(mut self, us: u32) -> Self {
        self.stable_poll_period_us = Some(us);
        self
    }

    pub fn with_poll_timeout_ms(mut self, ms: u32) -> Self {
        self.poll_timeout_ms = ms;
        self
    }

    pub fn with_ghostkey_check(mut self, enabled: bool) -> Self {
        self.ghostkey_check = enabled;
        self
    }

    pub fn with_actual_key_mask(mut self, mask: Vec<Row, MAX_COLS>) -> Self {
        self.actual_key_mask = Some(mask);
        self
    }

    /// Bits of a sampled row mask that correspond to configured rows.
    pub fn row_mask(&self) -> Row {
        if self.row_size >= ROW_BITS {
            Row::MAX
        } else {
            ((1 as Row) << self.row_size) - 1
        }
    }

    /// Rows that can be reported on column `col`.
    pub fn column_mask(&self, col: usize) -> Row {
        let mask = self.row_mask();
        match &self.actual_key_mask {
            Some(keys) => keys.get(col).map_or(0, |m| m & mask),
            None => mask,
        }
    }

    /// Scan period used while no key is mid-debounce.
    pub fn stable_poll_period_us(&self) -> u32 {
        self.stable_poll_period_us.unwrap_or(self.poll_period_us)
    }

    /// Check every construction-time invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.col_size == 0 || self.col_size > MAX_COLS {
            return Err(ConfigError::ColumnCount(self.col_size));
        }
        if self.row_size == 0 || self.row_size > ROW_BITS {
            return Err(ConfigError::RowCount(self.row_size));
        }
        if self.poll_period_us == 0 {
            return Err(ConfigError::ZeroPollPeriod);
        }
        if let Some(stable_us) = self.stable_poll_period_us {
            if stable_us < self.poll_period_us {
                return Err(ConfigError::StablePollPeriod {
                    stable_us,
                    period_us: self.poll_period_us,
                });
            }
        }

        // Timestamps of keys still inside their window must survive until
        // the window closes, so the window may not span a full ring.
        let window_us = u64::from(self.debounce_down_ms.max(self.debounce_up_ms)) * 1_000;
        let cycles = window_us.div_ceil(u64::from(self.poll_period_us));
        if cycles >= SCAN_OCCURRENCES as u64 {
            return Err(ConfigError::DebounceWindowTooLong {
                cycles: u32::try_from(cycles).unwrap_or(u32::MAX),
                max: SCAN_OCCURRENCES as u32,
            });
        }

        if let Some(keys) = &self.actual_key_mask {
            if keys.len() != self.col_size {
                return Err(ConfigError::KeyMaskLength {
                    expected: self.col_size,
                    got: keys.len(),
                });
            }
        }

        Ok(())
    }
}
