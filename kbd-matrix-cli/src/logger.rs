//! Minimal stderr backend for the `log` facade.

use anyhow::{anyhow, Result};
use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

/// Level for a `-v` count: warnings by default, then debug, then trace.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the logger. Call once, before anything logs.
pub fn init(verbosity: u8) -> Result<()> {
    log::set_logger(&LOGGER).map_err(|e| anyhow!("installing logger: {}", e))?;
    log::set_max_level(level_for(verbosity));
    Ok(())
}
