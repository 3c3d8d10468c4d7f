mod layout;
mod logger;
mod script;
mod sim;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kbd_matrix::config::{
    DEFAULT_DEBOUNCE_DOWN_MS, DEFAULT_DEBOUNCE_UP_MS, DEFAULT_POLL_PERIOD_US,
    DEFAULT_POLL_TIMEOUT_MS, DEFAULT_SETTLE_TIME_US,
};
use kbd_matrix::{is_ghosting, Config, EmbassyTimebase};
use std::fs;

use sim::{SimTimebase, SimUptime, WallClock};

#[derive(Parser)]
#[command(name = "kbd-matrix")]
#[command(about = "Keyboard matrix scanner simulator")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario script through the scanner and print reported events
    Simulate {
        /// Path to the scenario script
        script: String,

        #[command(flatten)]
        matrix: MatrixArgs,

        /// Pace the run on the wall clock instead of a virtual one
        #[arg(long)]
        realtime: bool,
    },
    /// Check raw column masks (0b.., 0x.. or decimal) for ghosting
    Ghost {
        #[arg(required = true)]
        masks: Vec<String>,
    },
}

#[derive(Args)]
struct MatrixArgs {
    #[arg(long, default_value_t = 4)]
    cols: usize,
    #[arg(long, default_value_t = 4)]
    rows: usize,
    #[arg(long, default_value_t = DEFAULT_SETTLE_TIME_US)]
    settle_us: u32,
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_DOWN_MS)]
    debounce_down_ms: u32,
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_UP_MS)]
    debounce_up_ms: u32,
    #[arg(long, default_value_t = DEFAULT_POLL_PERIOD_US)]
    poll_period_us: u32,
    /// Scan period while no key is mid-debounce (defaults to --poll-period-us)
    #[arg(long)]
    stable_poll_period_us: Option<u32>,
    #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT_MS)]
    poll_timeout_ms: u32,
    /// Skip the ghost key check
    #[arg(long)]
    no_ghostkey_check: bool,
}

impl MatrixArgs {
    fn to_config(&self) -> Config {
        let cfg = Config::new(self.cols, self.rows)
            .with_settle_time_us(self.settle_us)
            .with_debounce_ms(self.debounce_down_ms, self.debounce_up_ms)
            .with_poll_period_us(self.poll_period_us)
            .with_poll_timeout_ms(self.poll_timeout_ms)
            .with_ghostkey_check(!self.no_ghostkey_check);

        match self.stable_poll_period_us {
            Some(us) => cfg.with_stable_poll_period_us(us),
            None => cfg,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose)?;

    match cli.command {
        Command::Simulate {
            script,
            matrix,
            realtime,
        } => {
            let contents =
                fs::read_to_string(&script).with_context(|| format!("reading {}", script))?;
            let parsed = script::parse_script(&contents).context("parsing scenario script")?;
            let cfg = matrix.to_config();

            let report = if realtime {
                sim::simulate(&parsed, cfg, &EmbassyTimebase, &WallClock::new())?
            } else {
                let timebase = SimTimebase::default();
                sim::simulate(&parsed, cfg, &timebase, &SimUptime::new(&timebase))?
            };

            for (at_us, event) in &report.events {
                println!("{}", layout::format_event(*at_us, event));
            }
            println!(
                "{} events, {} wakes, {} switch changes in script",
                report.events.len(),
                report.wakes,
                parsed.events.len()
            );
            print!("{}", layout::render_grid(&report.stable, matrix.rows));
        }
        Command::Ghost { masks } => {
            let state = masks
                .iter()
                .map(|m| script::parse_mask(m))
                .collect::<Result<Vec<_>>>()?;

            if is_ghosting(&state) {
                println!("ghosting: a two-column block has more than one common row");
            } else {
                println!("no ghosting");
            }
        }
    }

    Ok(())
}
