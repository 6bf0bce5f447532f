use crate::config::{self, Config};
use crate::genome::Genome;
use crate::pipeline::{
    ConservationStage, CoverageStage, ExclusionStage, Pipeline, SelectionStage, TypingStage,
};
use crate::report;
use clap::Args;
use colored::*;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Args)]
pub struct RunArgs {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Reference genome directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub reference_dir: Option<PathBuf>,

    /// Strain genome directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub common_dir: Option<PathBuf>,

    /// Off-target genome directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub offtarget_dir: Option<PathBuf>,

    /// Output directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Treat the reference files as chromosomes of one organism
    #[arg(long)]
    pub merge_chromosomes: bool,

    /// Skip off-target files already recorded in the typing resume ledger
    #[arg(long)]
    pub resume: bool,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    if let Some(dir) = args.reference_dir {
        config.io.reference_dir = dir;
    }
    if let Some(dir) = args.common_dir {
        config.io.common_dir = dir;
    }
    if let Some(dir) = args.offtarget_dir {
        config.io.offtarget_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.io.output_dir = dir;
    }
    if args.merge_chromosomes {
        config.selection.merge_chromosomes = true;
    }

    let reference = fasta_files(&config.io.reference_dir)?;
    if reference.is_empty() {
        anyhow::bail!(
            "no reference genome files found in {}",
            config.io.reference_dir.display()
        );
    }
    let common = fasta_files(&config.io.common_dir)?;
    let offtarget = fasta_files(&config.io.offtarget_dir)?;
    if common.is_empty() {
        warn!(dir = %config.io.common_dir.display(), "no strain genomes; conservation filter is a no-op");
    }
    if offtarget.is_empty() {
        warn!(dir = %config.io.offtarget_dir.display(), "no off-target genomes; exclusion and typing are no-ops");
    }

    let pipeline = Pipeline::new(&config.io.output_dir)
        .with_quiet(args.quiet)
        .add_stage(SelectionStage::new(reference, config.selection.clone()))
        .add_stage(ConservationStage::new(common.clone()))
        .add_stage(ExclusionStage::new(offtarget.clone()))
        .add_stage(TypingStage::new(offtarget, config.typing.clone()).with_resume(args.resume))
        .add_stage(CoverageStage::new(common));

    let outcome = pipeline.run(Genome::new("candidates", true))?;
    report::write_report(&outcome, &config.io.output_dir)?;

    println!();
    for stage in &outcome.stages {
        println!(
            "  {:12} {} -> {} ({} discarded)",
            stage.name.bold(),
            stage.input,
            stage.output,
            stage.discarded
        );
    }
    println!(
        "\n{} {} surviving candidates, results in {}",
        "Done:".green().bold(),
        outcome.candidates.len(),
        config.io.output_dir.display()
    );

    Ok(())
}

/// FASTA files in `dir`, in sorted order so runs are deterministic.
/// A missing directory is treated as empty.
fn fasta_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for pattern in ["*.fasta", "*.fa", "*.fna", "*.fasta.gz", "*.fa.gz", "*.fna.gz"] {
        let full = dir.join(pattern);
        for entry in glob::glob(&full.to_string_lossy())? {
            files.push(entry?);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
