//! One keyboard matrix device and its polling worker.
//!
//! The worker alternates between two states. Armed: every column is driven
//! and the hardware watches the rows for a keypress, while the worker waits
//! on the [`WakeGate`]. Active: detection is off and the worker scans at the
//! poll period until the matrix has been quiet for the poll timeout.
//!
//! The worker is the only writer of the scan and debounce state, so none of
//! it is locked. The gate is the only thing shared with other contexts.

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;
use log::{debug, trace};

use crate::api::{ColumnDrive, EventSink, MatrixApi};
use crate::config::{Config, ConfigError};
use crate::debounce::Debouncer;
use crate::gate::WakeGate;
use crate::ghost::is_ghosting;
use crate::scan::scan;
use crate::time::Timebase;
use crate::{Row, MAX_COLS};

pub struct KbdMatrix<'g, A, T, S, M: RawMutex> {
    pub(crate) api: A,
    pub(crate) timebase: T,
    pub(crate) sink: S,
    pub(crate) gate: &'g WakeGate<M>,
    pub(crate) config: Config,
    /// Raw snapshot of the scan in progress.
    pub(crate) new_state: Vec<Row, MAX_COLS>,
    pub(crate) debouncer: Debouncer,
}

impl<'g, A, T, S, M> KbdMatrix<'g, A, T, S, M>
where
    A: MatrixApi,
    T: Timebase,
    S: EventSink,
    M: RawMutex,
{
    /// Validate `config` and allocate all per-device state.
    pub fn new(
        config: Config,
        api: A,
        timebase: T,
        sink: S,
        gate: &'g WakeGate<M>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            api,
            timebase,
            sink,
            gate,
            new_state: core::iter::repeat(0).take(config.col_size).collect(),
            debouncer: Debouncer::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ask the worker to start scanning, as if a key had been detected.
    pub fn start_polling(&self) {
        self.gate.start_polling();
    }

    /// Confirmed key state, one mask per column.
    pub fn stable_state(&self) -> &[Row] {
        self.debouncer.stable_state()
    }

    /// Run one scan cycle. Returns whether any row read active, even when
    /// the cycle was dropped for ghosting.
    pub(crate) fn check_key_events(&mut self) -> bool {
        self.debouncer.next_cycle();

        let key_pressed = scan(
            &mut self.api,
            &self.timebase,
            &self.config,
            &mut self.new_state,
        );

        let unstable = self.debouncer.unstable_state();
        let previous = self.debouncer.previous_state();
        for (c, new) in self.new_state.iter().enumerate() {
            debug!("U{:x}, P{:x}, N{:x}", unstable[c], previous[c], new);
        }

        // Abort if ghosting is detected
        if self.config.ghostkey_check && is_ghosting(&self.new_state) {
            trace!("ghosting detected, skipping debounce");
            return key_pressed;
        }

        let now = self.timebase.now();
        self.debouncer
            .update(&self.new_state, now, &self.timebase, &mut self.sink);

        key_pressed
    }

    /// One armed/active round: arm detection, wait for a wake, then poll
    /// until the matrix goes quiet.
    pub async fn run_once(&mut self) {
        self.api.drive_column(ColumnDrive::All);
        self.api.set_detect_mode(true);

        self.gate.wait().await;
        debug!("Start KB scan");

        // Detection off while the worker drives the columns itself
        self.api.set_detect_mode(false);

        self.run_active_loop().await;
    }

    /// Worker body. Never returns.
    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }
}
