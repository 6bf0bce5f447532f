use crate::bio::sequence::Strand;
use crate::genome::Genome;
use clap::Args;
use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args)]
pub struct StatsArgs {
    /// Candidate snapshot file (`raw strand startIndex genomeId` lines)
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, Serialize)]
struct SnapshotStats {
    total: usize,
    forward: usize,
    complement: usize,
    gc_min: usize,
    gc_max: usize,
    gc_mean: f64,
    by_genome: BTreeMap<String, usize>,
}

impl SnapshotStats {
    fn calculate(genome: &Genome) -> Self {
        let mut forward = 0;
        let mut gc_min = usize::MAX;
        let mut gc_max = 0;
        let mut gc_sum = 0usize;
        let mut by_genome: BTreeMap<String, usize> = BTreeMap::new();

        for s in genome.sequences() {
            if s.strand() == Strand::Forward {
                forward += 1;
            }
            gc_min = gc_min.min(s.gc_count());
            gc_max = gc_max.max(s.gc_count());
            gc_sum += s.gc_count();
            *by_genome.entry(s.genome().to_string()).or_insert(0) += 1;
        }

        let total = genome.len();
        Self {
            total,
            forward,
            complement: total - forward,
            gc_min: if total == 0 { 0 } else { gc_min },
            gc_max,
            gc_mean: if total == 0 {
                0.0
            } else {
                gc_sum as f64 / total as f64
            },
            by_genome,
        }
    }
}

pub fn run(args: StatsArgs) -> anyhow::Result<()> {
    let genome = Genome::load("snapshot", &args.input, false)?;
    let stats = SnapshotStats::calculate(&genome);

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => {
            println!("{}", "Candidate Snapshot".bold());
            println!("------------------");
            println!("Total:      {}", stats.total);
            println!("Forward:    {}", stats.forward);
            println!("Complement: {}", stats.complement);
            println!(
                "Target GC:  {}..{} (mean {:.1})",
                stats.gc_min, stats.gc_max, stats.gc_mean
            );
            if !stats.by_genome.is_empty() {
                println!("\n{}", "By source genome".bold());
                for (genome, count) in &stats.by_genome {
                    println!("  {:24} {}", genome, count);
                }
            }
        }
    }

    Ok(())
}
