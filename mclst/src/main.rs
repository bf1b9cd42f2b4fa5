#[macro_use]
extern crate log;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use mclst::cli::Cli;
use mclst::config::{self, Config};
use mclst::output::OutputHandler;
use mclst::{receiver, sender};
use pimc_core::error::{PimcResult, ResultExt, SystemError};
use pimc_core::net::IntfTable;

/// Signals that set the stop flag: interrupt, termination, and hangup.
const STOP_SIGNALS: [std::ffi::c_int; 3] = [
    signal_hook::consts::SIGINT,
    signal_hook::consts::SIGTERM,
    signal_hook::consts::SIGHUP,
];

#[quit::main]
fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("mclst {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    init_logging();

    if let Err(e) = run(&cli) {
        error!("{e}");
        quit::with_code(e.err().exit_code());
    }
}

fn init_logging() {
    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .filter_module("polling", log::LevelFilter::Off)
        .format_timestamp_secs();
    let _ = builder.try_init();
    log_panics::init();
}

fn run(cli: &Cli) -> PimcResult<()> {
    let intf_table = IntfTable::load().context("unable to load interface table").typ(SystemError::Resource)?;
    let cfg = Config::from_cli(cli, &intf_table)?;

    if cfg.show_config {
        config::show(&cfg, &intf_table)?;
        return Ok(());
    }

    let oh = OutputHandler::new(&cfg);

    let stop = Arc::new(AtomicBool::new(false));
    for sig in STOP_SIGNALS {
        signal_hook::flag::register(sig, Arc::clone(&stop))
            .context("unable to install signal handler")
            .typ(SystemError::Resource)?;
    }

    if cfg.sender {
        sender::run(&cfg, &oh, &stop)
    } else {
        receiver::run(&cfg, &oh, &stop)
    }
}
