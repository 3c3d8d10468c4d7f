//! Ghost key detection.
//!
//! Without a diode per switch, current can flow backwards through closed
//! switches. With keys w, q and a held in this block
//!
//! ```text
//! . . w . q .
//! . . . . . .
//! . . m . a .
//! ```
//!
//! the driven column of `w` reaches the row of `q`, then the column of `a`,
//! then the row of `m`, so `m` reads as pressed too. The block need not use
//! adjacent columns or rows.

use crate::Row;

/// Whether any two columns share more than one active row.
///
/// Such a pair is a rectangle with three or four corners closed, and a
/// three-corner rectangle cannot be told apart from four real presses.
pub fn is_ghosting(state: &[Row]) -> bool {
    for (c, &col) in state.iter().enumerate() {
        if col == 0 {
            continue;
        }

        for &next in &state[c + 1..] {
            // z & (z - 1) is non-zero only if z has more than one bit set
            let common = col & next;
            if common & common.wrapping_sub(1) != 0 {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_across_two_columns() {
        assert!(is_ghosting(&[0b011, 0b011, 0]));
        assert!(is_ghosting(&[0b0101, 0, 0, 0b1101]));
    }

    #[test]
    fn test_single_shared_row_is_fine() {
        assert!(!is_ghosting(&[0b011, 0b010, 0b100]));
        assert!(!is_ghosting(&[0b1111, 0, 0]));
        assert!(!is_ghosting(&[0, 0]));
        assert!(!is_ghosting(&[]));
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let state = [0b0110, 0b0001, 0b1110, 0];
        let mut reversed = state;
        reversed.reverse();
        assert!(is_ghosting(&state));
        assert!(is_ghosting(&reversed));

        let state = [0b0100, 0b0001, 0b1010];
        let mut reversed = state;
        reversed.reverse();
        assert!(!is_ghosting(&state));
        assert!(!is_ghosting(&reversed));
    }

    #[test]
    fn test_extra_idle_columns_do_not_change_verdict() {
        let mut state = vec![0 as Row; 12];
        state[3] = 0b1001;
        state[9] = 0b1000;
        assert!(!is_ghosting(&state));
        state[11] = 0b1001;
        assert!(is_ghosting(&state));
    }
}
