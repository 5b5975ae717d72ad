//! Run a simulation described by a YAML file
use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use ddmd::{
    config::SimConfig, logging, parallel::Universe, registry::StyleRegistry, Error, Simulation,
};

/// Domain-decomposed molecular dynamics with YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    config: PathBuf,

    /// Number of ranks to run on
    #[arg(default_value_t = 1)]
    nranks: usize,
}

fn run(path: &Path, nranks: usize) -> Result<(), Error> {
    let config = SimConfig::from_file(path)?;
    let registry = StyleRegistry::default();
    let summaries = Universe::run(nranks, |comm| {
        let mut sim = Simulation::from_config(comm, &config, &registry)?;
        sim.run_configured()
    })?;
    let sent: usize = summaries.iter().map(|s| s.atoms_sent).sum();
    if let Some(first) = summaries.first() {
        tracing::info!(
            steps = first.steps,
            neighbor_builds = first.neighbor_builds,
            atoms_migrated = sent,
            "Done"
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = env::var("DDMD_LOG").unwrap_or_else(|_| "info".to_string());
    logging::init(logging::level_from_name(&level));

    match run(&args.config, args.nranks) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
