use anyhow::{bail, Context, Result};
use kbd_matrix::{Config, Row};

/// A physical switch closing or opening at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchEvent {
    pub at_us: u64,
    pub col: usize,
    pub row: usize,
    pub pressed: bool,
}

/// Parsed scenario: switch events in time order, and the time at which
/// every switch is let go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub events: Vec<SwitchEvent>,
    pub end_us: u64,
}

/// Parse a scenario script.
///
/// One directive per line, `#` starts a comment:
/// - `<time> press <col> <row>`
/// - `<time> release <col> <row>`
/// - `end <time>`: release everything at `<time>` (default: last event)
///
/// Times are `<n>us` or `<n>ms` and may not go backwards.
pub fn parse_script(input: &str) -> Result<Script> {
    let mut events: Vec<SwitchEvent> = Vec::new();
    let mut end_us: Option<u64> = None;
    let mut last_us: u64 = 0;

    for (line_num, line) in input.lines().enumerate() {
        let line = match line.split_once('#') {
            Some((code, _)) => code,
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields[0] == "end" {
            if fields.len() != 2 {
                bail!("line {}: expected `end <time>`", line_num + 1);
            }
            let at_us = parse_time(fields[1])
                .with_context(|| format!("line {}: invalid time", line_num + 1))?;
            end_us = Some(at_us);
            continue;
        }

        if fields.len() != 4 {
            bail!(
                "line {}: expected `<time> press|release <col> <row>`, got {} fields",
                line_num + 1,
                fields.len()
            );
        }

        let at_us = parse_time(fields[0])
            .with_context(|| format!("line {}: invalid time", line_num + 1))?;
        if at_us < last_us {
            bail!("line {}: time goes backwards", line_num + 1);
        }
        last_us = at_us;

        let pressed = match fields[1] {
            "press" => true,
            "release" => false,
            other => bail!("line {}: unknown action `{}`", line_num + 1, other),
        };

        let col = fields[2]
            .parse()
            .with_context(|| format!("line {}: invalid column", line_num + 1))?;
        let row = fields[3]
            .parse()
            .with_context(|| format!("line {}: invalid row", line_num + 1))?;

        events.push(SwitchEvent {
            at_us,
            col,
            row,
            pressed,
        });
    }

    let end_us = match end_us {
        Some(end) if end < last_us => bail!("`end` is before the last event"),
        Some(end) => end,
        None => last_us,
    };

    Ok(Script { events, end_us })
}

impl Script {
    /// Make sure every event addresses a key inside the matrix.
    pub fn check(&self, cfg: &Config) -> Result<()> {
        for ev in &self.events {
            if ev.col >= cfg.col_size || ev.row >= cfg.row_size {
                bail!(
                    "key ({}, {}) at {}us is outside the {}x{} matrix",
                    ev.col,
                    ev.row,
                    ev.at_us,
                    cfg.col_size,
                    cfg.row_size
                );
            }
        }
        Ok(())
    }

    /// Physically closed switches at `t_us`, one mask per column.
    pub fn switches_at(&self, t_us: u64, cols: usize) -> Vec<Row> {
        let mut state = vec![0 as Row; cols];
        if t_us >= self.end_us {
            return state;
        }

        for ev in self.events.iter().take_while(|ev| ev.at_us <= t_us) {
            if let Some(col) = state.get_mut(ev.col) {
                if ev.pressed {
                    *col |= 1 << ev.row;
                } else {
                    *col &= !(1 << ev.row);
                }
            }
        }
        state
    }
}

fn parse_time(s: &str) -> Result<u64> {
    let (digits, scale) = if let Some(n) = s.strip_suffix("us") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix("ms") {
        (n, 1_000)
    } else {
        bail!("`{}` needs a `us` or `ms` suffix", s);
    };

    let value: u64 = digits
        .parse()
        .with_context(|| format!("invalid number `{}`", digits))?;
    value
        .checked_mul(scale)
        .with_context(|| format!("`{}` is too large", s))
}

/// Parse a row mask written as `0b...`, `0x...` or decimal.
pub fn parse_mask(s: &str) -> Result<Row> {
    let parsed = if let Some(bin) = s.strip_prefix("0b") {
        Row::from_str_radix(bin, 2)
    } else if let Some(hex) = s.strip_prefix("0x") {
        Row::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.with_context(|| format!("invalid row mask `{}`", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_script() {
        let script = "# hold one key\n\
                      0ms press 0 0\n\
                      \n\
                      1500us release 0 0   # let go\n";
        let script = parse_script(script).unwrap();
        assert_eq!(
            script.events,
            vec![
                SwitchEvent {
                    at_us: 0,
                    col: 0,
                    row: 0,
                    pressed: true
                },
                SwitchEvent {
                    at_us: 1_500,
                    col: 0,
                    row: 0,
                    pressed: false
                },
            ]
        );
        assert_eq!(script.end_us, 1_500);
    }

    #[test]
    fn test_end_directive() {
        let script = parse_script("2ms press 1 2\nend 40ms\n").unwrap();
        assert_eq!(script.end_us, 40_000);

        assert!(parse_script("5ms press 0 0\nend 1ms\n").is_err());
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_script("0ms press 0 0\n1ms tap 0 0\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = parse_script("3ms press 0 0\n1ms press 0 1\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = parse_script("3 press 0 0\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_switches_at() {
        let script = parse_script(
            "0ms press 0 0\n\
             1ms press 1 1\n\
             2ms release 0 0\n\
             end 5ms\n",
        )
        .unwrap();
        assert_eq!(script.switches_at(0, 2), vec![0b01, 0b00]);
        assert_eq!(script.switches_at(1_500, 2), vec![0b01, 0b10]);
        assert_eq!(script.switches_at(2_000, 2), vec![0b00, 0b10]);
        assert_eq!(script.switches_at(5_000, 2), vec![0b00, 0b00]);
    }

    #[test]
    fn test_check_geometry() {
        let script = parse_script("0ms press 3 0\n").unwrap();
        assert!(script.check(&Config::new(4, 2)).is_ok());
        assert!(script.check(&Config::new(3, 2)).is_err());
    }

    #[test]
    fn test_parse_mask() {
        assert_eq!(parse_mask("0b101").unwrap(), 5);
        assert_eq!(parse_mask("0x0f").unwrap(), 15);
        assert_eq!(parse_mask("7").unwrap(), 7);
        assert!(parse_mask("0b2").is_err());
        assert!(parse_mask("0x1ffff").is_err());
    }
}
