use crate::bio::fasta;
use crate::bio::sequence::Sequence;
use crate::genome::Genome;
use crate::pipeline::{Stage, StageContext};
use crate::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

/// Removes candidates that occur verbatim in any off-target genome
/// (logical OR-exclusion across files).
pub struct ExclusionStage {
    files: Vec<PathBuf>,
}

impl ExclusionStage {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

impl Stage for ExclusionStage {
    fn name(&self) -> &'static str {
        "exclusion"
    }

    fn execute(&self, mut candidates: Genome, ctx: &StageContext) -> Result<Option<Genome>> {
        for file in &self.files {
            if candidates.is_empty() {
                ctx.log
                    .line("candidate set empty, skipping remaining off-target genomes");
                break;
            }

            let offtarget = Genome::from_file(file, &[], true)?;
            let name = fasta::genome_id(file);

            let pool: Vec<&Sequence> = candidates.sequences().collect();
            let found: HashSet<Sequence> = pool
                .par_iter()
                .filter(|s| offtarget.exists(s))
                .map(|&s| s.clone())
                .collect();

            for gone in &found {
                ctx.discards.record(gone, &format!("found in {}", name));
            }
            candidates.remove_all(&found);

            ctx.log.line(&format!(
                "{}: removed {}, {} candidates remain",
                name,
                found.len(),
                candidates.len()
            ));
            info!(
                offtarget = %name,
                removed = found.len(),
                remaining = candidates.len(),
                "exclusion pass"
            );
        }

        if candidates.is_empty() {
            return Ok(None);
        }
        Ok(Some(candidates))
    }
}
