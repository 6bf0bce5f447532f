use clap::Parser;
use colored::*;
use crisel::cli::{Cli, Commands};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize logging with CRISEL_LOG environment variable support
    let log_level = std::env::var("CRISEL_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);

        // Use appropriate exit codes based on error type
        let exit_code = match e.downcast_ref::<crisel::CriselError>() {
            Some(crisel::CriselError::Config(_)) => 2,
            Some(crisel::CriselError::Io(_)) => 3,
            Some(crisel::CriselError::Parse(_)) | Some(crisel::CriselError::Genome(_)) => 4,
            Some(crisel::CriselError::Pipeline(_)) => 5,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // Configure thread pool
    let num_threads = if cli.threads == 0 {
        num_cpus::get()
    } else {
        cli.threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .expect("Failed to initialize thread pool");

    if cli.verbose > 0 {
        eprintln!("Using {} threads", num_threads);
    }

    match cli.command {
        Commands::Run(args) => crisel::cli::commands::run::run(args),
        Commands::Stats(args) => crisel::cli::commands::stats::run(args),
    }
}
