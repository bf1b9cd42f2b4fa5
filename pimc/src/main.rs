#[macro_use]
extern crate log;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use pimc::cli::Cli;
use pimc::config::{build_pim_config, load_yaml};
use pimc::logging;
use pimc_core::error::{PimcResult, ResultExt, SystemError};
use pimc_core::plan::{build_updates, inverse_updates};
use pimc_core::scheduler::{HelloParams, Scheduler};
use pimc_core::transport::PimTransport;

/// Signals that set the stop flag: interrupt, termination, and hangup.
const STOP_SIGNALS: [std::ffi::c_int; 3] = [
    signal_hook::consts::SIGINT,
    signal_hook::consts::SIGTERM,
    signal_hook::consts::SIGHUP,
];

#[quit::main]
fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("{e}");
        quit::with_code(e.err().exit_code());
    }
}

fn run(cli: &Cli) -> PimcResult<()> {
    let yaml = load_yaml(&cli.config)?;

    let level = yaml
        .logging
        .as_ref()
        .map(|l| l.level.clone())
        .unwrap_or_else(|| "info".into());
    let dir = yaml.logging.as_ref().and_then(|l| l.dir.clone());
    logging::init(&level, dir.as_deref())?;

    let (pimsm, jp_config) = build_pim_config(&yaml)?;

    let updates = build_updates(&jp_config, &pimsm);
    let inverse = inverse_updates(&updates);

    info!(
        "loaded configuration: {} group(s), {} update message(s) for neighbor {}",
        jp_config.groups().len(),
        updates.len(),
        pimsm.neighbor
    );

    let transport = PimTransport::open(pimsm.intf_addr)?;

    let stop = Arc::new(AtomicBool::new(false));
    for sig in STOP_SIGNALS {
        signal_hook::flag::register(sig, Arc::clone(&stop))
            .context("unable to install signal handler")
            .typ(SystemError::Resource)?;
    }

    let hello_params = HelloParams {
        period: pimsm.hello_period,
        holdtime: pimsm.hello_holdtime.as_secs() as u16,
        dr_priority: pimsm.dr_priority,
        generation_id: pimsm.generation_id,
    };

    let scheduler = Scheduler::new(
        transport,
        hello_params,
        pimsm.jp_period,
        updates,
        inverse,
        stop,
    );
    scheduler.run()
}
