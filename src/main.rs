use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schelling::manager::Manager;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Directory holding `config.toml` and the run dirs.
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate a new run.
    Create,

    /// Print a saved frame of a run.
    Show {
        #[arg(long)]
        run_idx: usize,

        /// Frame to print, the last one if omitted.
        #[arg(long)]
        frame_idx: Option<usize>,
    },

    /// Compute the observables of every run.
    Analyze,

    /// Remove every run.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Create => mgr.create_run()?,
        Command::Show { run_idx, frame_idx } => {
            let frame = mgr.load_frame(run_idx, frame_idx)?;
            print!("{}", frame.type_map);
        }
        Command::Analyze => mgr.analyze_sim()?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
