//! Seams between the core and the outside world.
//!
//! The core never touches GPIO or interrupt controllers itself. A board
//! crate implements [`MatrixApi`] for its drive/sense lines and hands the
//! core an [`EventSink`] that receives confirmed key transitions.

use crate::Row;

/// Which columns to drive before sampling the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDrive {
    /// Drive exactly one column.
    Column(usize),
    /// Drive every column, so any pressed key shows up on its row.
    All,
    /// Release every column.
    None,
}

/// Hardware drive/sense capability of one matrix.
pub trait MatrixApi {
    /// Assert drive on one column, all columns, or none.
    fn drive_column(&mut self, drive: ColumnDrive);

    /// Sample the row sense lines. Bit `n` set means row `n` is active.
    fn read_row(&mut self) -> Row;

    /// Arm (`true`) or disarm (`false`) wake-on-keypress detection.
    fn set_detect_mode(&mut self, enabled: bool);
}

/// A confirmed key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub col: u8,
    pub row: u8,
    pub pressed: bool,
}

impl KeyEvent {
    pub const fn new(col: u8, row: u8, pressed: bool) -> Self {
        Self { col, row, pressed }
    }
}

/// Consumer of confirmed key transitions, called in confirmation order.
pub trait EventSink {
    fn report(&mut self, event: KeyEvent);
}

impl<F> EventSink for F
where
    F: FnMut(KeyEvent),
{
    fn report(&mut self, event: KeyEvent) {
        self(event)
    }
}
