use crate::bio::fasta;
use crate::bio::sequence::Sequence;
use crate::genome::Genome;
use crate::pipeline::{Stage, StageContext};
use crate::Result;
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Output map of candidate raw text to the strain genomes carrying it.
/// Distinct from the stage snapshot `coverage.txt` the pipeline persists.
pub const COVERAGE_MAP_FILE: &str = "coverage_map.txt";

/// Records which strain genomes carry each surviving candidate verbatim.
///
/// Reporting only: the candidate set passes through unchanged.
pub struct CoverageStage {
    files: Vec<PathBuf>,
}

impl CoverageStage {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

impl Stage for CoverageStage {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn execute(&self, candidates: Genome, ctx: &StageContext) -> Result<Option<Genome>> {
        let coverage: DashMap<String, BTreeSet<String>> = DashMap::new();

        if !candidates.is_empty() {
            for file in &self.files {
                let strain = Genome::from_file(file, &[], true)?;
                let name = fasta::genome_id(file);

                let pool: Vec<&Sequence> = candidates.sequences().collect();
                pool.par_iter().filter(|s| strain.exists(s)).for_each(|s| {
                    coverage
                        .entry(s.raw().to_string())
                        .or_default()
                        .insert(name.clone());
                });

                ctx.log.line(&format!(
                    "{}: {} candidates covered",
                    name,
                    coverage.iter().filter(|e| e.value().contains(&name)).count()
                ));
                info!(strain = %name, "coverage pass");
            }
        }

        let path = ctx.output_dir.join(COVERAGE_MAP_FILE);
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for candidate in candidates.sorted() {
            let genomes = coverage
                .get(candidate.raw())
                .map(|names| names.iter().cloned().collect::<Vec<_>>().join(","))
                .unwrap_or_default();
            if genomes.is_empty() {
                writeln!(writer, "{}", candidate.raw())?;
            } else {
                writeln!(writer, "{} {}", candidate.raw(), genomes)?;
            }
        }
        writer.flush()?;

        Ok(Some(candidates))
    }
}
