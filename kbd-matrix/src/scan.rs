//! Raw matrix scanning.
//!
//! One column is driven at a time. After the settle delay every row that
//! reads active is connected to the driven column through a closed switch
//! (or through a chain of them, see [`crate::ghost`]). Rows are packed one
//! bit per row into a [`Row`] mask per column.

use crate::api::{ColumnDrive, MatrixApi};
use crate::config::Config;
use crate::time::Timebase;
use crate::Row;

/// Scan every column into `new_state`.
///
/// Rows outside `row_size` and positions missing from the actual key mask
/// are dropped. Returns whether any row read active on any column. All
/// columns are released when the scan is done.
pub fn scan<A, T>(api: &mut A, timebase: &T, cfg: &Config, new_state: &mut [Row]) -> bool
where
    A: MatrixApi,
    T: Timebase,
{
    let mut key_event: Row = 0;

    for (col, state) in new_state.iter_mut().enumerate().take(cfg.col_size) {
        api.drive_column(ColumnDrive::Column(col));

        // Allow the matrix to stabilize before reading it
        timebase.busy_wait_us(cfg.settle_time_us);

        let row = api.read_row() & cfg.column_mask(col);
        *state = row;
        key_event |= row;
    }

    api.drive_column(ColumnDrive::None);

    key_event != 0
}


#[cfg(test)]
mod tests {
    use super::testing::FakeMatrix;
    use super::*;
    use crate::time::testing::FakeTimebase;

    #[test]
    fn test_scan_drives_each_column_then_none() {
        let mut hw = FakeMatrix::with_frames([vec![0, 0, 0]]);
        let tb = FakeTimebase::default();
        let cfg = Config::new(3, 4).with_settle_time_us(7);
        let mut state = [0 as Row; 3];

        assert!(!scan(&mut hw, &tb, &cfg, &mut state));
        assert_eq!(
            hw.drives,
            vec![
                ColumnDrive::Column(0),
                ColumnDrive::Column(1),
                ColumnDrive::Column(2),
                ColumnDrive::None,
            ]
        );
        // One settle delay per column
        assert_eq!(tb.now.get(), 21);
    }

    #[test]
    fn test_scan_masks_unused_rows() {
        let mut hw = FakeMatrix::with_frames([vec![0b1111_0001, 0b0000_0100]]);
        let tb = FakeTimebase::default();
        let cfg = Config::new(2, 3);
        let mut state = [0 as Row; 2];

        assert!(scan(&mut hw, &tb, &cfg, &mut state));
        assert_eq!(state, [0b001, 0b100]);
    }

    #[test]
    fn test_scan_applies_actual_key_mask() {
        let mut hw = FakeMatrix::with_frames([vec![0b11, 0b11]]);
        let tb = FakeTimebase::default();
        let mut keys = heapless::Vec::new();
        keys.push(0b01).unwrap();
        keys.push(0b00).unwrap();
        let cfg = Config::new(2, 2).with_actual_key_mask(keys);
        let mut state = [0 as Row; 2];

        assert!(scan(&mut hw, &tb, &cfg, &mut state));
        assert_eq!(state, [0b01, 0b00]);

        let mut hw = FakeMatrix::with_frames([vec![0b10, 0b11]]);
        assert!(!scan(&mut hw, &tb, &cfg, &mut state));
        assert_eq!(state, [0, 0]);
    }
}
