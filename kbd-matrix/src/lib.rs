//! Hardware-independent core of a keyboard matrix input driver.
//!
//! Scans a grid of switches one column at a time, drops scans that show
//! ghost keys, debounces every key on its own time window and reports
//! confirmed press/release transitions. A single worker per matrix owns all
//! of that state, sleeping until a keypress wakes it and polling until the
//! matrix goes quiet again.
//!
//! The board side implements [`MatrixApi`] for its GPIO lines and provides a
//! [`Timebase`]; confirmed transitions go to an [`EventSink`].
//!
//! This crate is `no_std` so it can run inside the firmware and inside
//! host-side tools alike.

#![cfg_attr(not(test), no_std)]

pub mod api;
pub mod config;
pub mod debounce;
pub mod gate;
pub mod ghost;
pub mod matrix;
pub mod poll;
pub mod scan;
pub mod time;

pub use api::{ColumnDrive, EventSink, KeyEvent, MatrixApi};
pub use config::{Config, ConfigError};
pub use gate::WakeGate;
pub use ghost::is_ghosting;
pub use matrix::KbdMatrix;
pub use time::{Cycles, Timebase};

#[cfg(feature = "embassy-time")]
pub use time::EmbassyTimebase;

/// Row sense mask for one column, one bit per row.
#[cfg(not(feature = "row-16bit"))]
pub type Row = u8;
/// Row sense mask for one column, one bit per row.
#[cfg(feature = "row-16bit")]
pub type Row = u16;

/// Number of rows a [`Row`] mask can hold.
pub const ROW_BITS: usize = Row::BITS as usize;

/// Largest supported number of columns.
pub const MAX_COLS: usize = 32;

/// Capacity of the per-key debounce bookkeeping.
pub const MAX_KEYS: usize = MAX_COLS * ROW_BITS;

/// Slots in the scan timestamp ring. The longest debounce window must span
/// fewer scan cycles than this.
pub const SCAN_OCCURRENCES: usize = 30;
