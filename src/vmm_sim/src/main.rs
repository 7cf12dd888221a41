//==================================================================================================
// Configuration
//==================================================================================================
#![deny(clippy::all)]

//==================================================================================================
// Modules
//==================================================================================================
mod args;
mod config;
mod report;
mod synthetic;

//==================================================================================================
// Imports
//==================================================================================================
use anyhow::Result;
use args::{
    Args,
    Source,
};
use vm_lib::{
    Experiment,
    PolicyPair,
    SweepReport,
};
use log::{
    debug,
    error,
};
use tokio::runtime::Builder;
use std::{
    path::Path,
    time::Instant,
};

fn main() {
    env_logger::init();

    match simulate() {
	Ok(true) => {},
	Ok(false) => std::process::exit(1),
	Err(err) => {
	    error!("{:#}", err);
	    eprintln!("error: {:#}", err);
	    std::process::exit(2);
	},
    }
}

/// Returns whether every requested pair completed.
fn simulate() -> Result<bool> {
    let Some(args) = Args::parse(std::env::args().collect())? else {
	return Ok(true);
    };

    let (config, workload) = match args.source() {
	Source::ConfigFile(path) => config::load(Path::new(path))?,
	Source::Synthetic { seed } => synthetic::generate(
	    *seed,
	    args.number_of_processes(),
	    args.number_of_references(),
	    args.number_of_pages(),
	),
    };
    print!("{}", report::header(&config));

    let experiment = Experiment::new(config, workload)?;
    let pairs: Vec<PolicyPair> = Experiment::pairs()
	.into_iter()
	.filter(|(disk, _)| args.disk().is_none_or(|d| d == *disk))
	.filter(|(_, replacement)| args.replacement().is_none_or(|r| r == *replacement))
	.collect();

    let start = Instant::now();
    let sweep: SweepReport = if args.concurrent() {
	let runtime = Builder::new_multi_thread()
	    .enable_all()
	    .build()?;
	runtime.block_on(experiment.sweep_pairs_concurrent(&pairs))
    } else {
	experiment.sweep_pairs(&pairs)
    };
    debug!("Sweep of {} pairs took {:?}", pairs.len(), start.elapsed());

    for stats in sweep.runs.iter() {
	println!("{}", report::run(stats));
    }
    print!("{}", report::summary(&sweep.runs));

    match sweep.failure {
	Some(err) => {
	    error!("{:#}", err);
	    eprintln!("simulation aborted after {} of {} pairs: {:#}", sweep.runs.len(), pairs.len(), err);
	    Ok(false)
	},
	None => Ok(true),
    }
}
