use crate::bio::fasta;
use crate::bio::sequence::Sequence;
use crate::genome::Genome;
use crate::pipeline::{Stage, StageContext};
use crate::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

/// Keeps only candidates conserved verbatim across every strain genome.
///
/// Each strain file becomes a short-lived auxiliary genome; candidates
/// missing from it are removed (logical AND across all files). A file that
/// fails to read aborts the whole stage: a partially-applied conservation
/// filter would leave non-conserved guides in the set.
pub struct ConservationStage {
    files: Vec<PathBuf>,
}

impl ConservationStage {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

impl Stage for ConservationStage {
    fn name(&self) -> &'static str {
        "conservation"
    }

    fn execute(&self, mut candidates: Genome, ctx: &StageContext) -> Result<Option<Genome>> {
        for file in &self.files {
            if candidates.is_empty() {
                ctx.log.line("candidate set empty, skipping remaining strain genomes");
                break;
            }

            let strain = Genome::from_file(file, &[], true)?;
            let name = fasta::genome_id(file);

            let pool: Vec<&Sequence> = candidates.sequences().collect();
            let missing: HashSet<Sequence> = pool
                .par_iter()
                .filter(|s| !strain.exists(s))
                .map(|&s| s.clone())
                .collect();

            for gone in &missing {
                ctx.discards.record(gone, &format!("not found in {}", name));
            }
            candidates.remove_all(&missing);

            ctx.log.line(&format!(
                "{}: removed {}, {} candidates remain",
                name,
                missing.len(),
                candidates.len()
            ));
            info!(
                strain = %name,
                removed = missing.len(),
                remaining = candidates.len(),
                "conservation pass"
            );
        }

        if candidates.is_empty() {
            return Ok(None);
        }
        Ok(Some(candidates))
    }
}
