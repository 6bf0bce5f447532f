pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "crisel",
    version,
    about = "CRISPR-Cas12a guide selection and off-target screening for bacterial genomes",
    long_about = "Crisel scans reference genomes for Cas12a guide candidates (TTTV PAM + \
                  20-base target), filters them for conservation across strain genomes and \
                  against cross-reactive off-target genomes, and classifies the survivors \
                  by off-target risk."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads to use (0 = all available)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    pub threads: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full selection pipeline
    Run(commands::run::RunArgs),

    /// Summarize a candidate snapshot file
    Stats(commands::stats::StatsArgs),
}
