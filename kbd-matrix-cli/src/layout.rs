//! Text rendering of simulation results.

use kbd_matrix::{KeyEvent, Row};

/// One line per event: time, position and direction.
pub fn format_event(at_us: u64, event: &KeyEvent) -> String {
    format!(
        "{:>10.3}ms  col {:>2}  row {:>2}  {}",
        at_us as f64 / 1_000.0,
        event.col,
        event.row,
        if event.pressed { "pressed" } else { "released" }
    )
}

/// Grid of stable key states, rows down and columns across. `#` marks a
/// held key, `.` a released one.
pub fn render_grid(state: &[Row], rows: usize) -> String {
    let mut out = String::from("     ");
    for col in 0..state.len() {
        out.push_str(&format!("{:>3}", col));
    }
    out.push('\n');

    for row in 0..rows {
        out.push_str(&format!("r{:<3} ", row));
        for &col in state {
            let cell = if col & (1 << row) != 0 { '#' } else { '.' };
            out.push_str(&format!("{:>3}", cell));
        }
        out.push('\n');
    }
    out
}
