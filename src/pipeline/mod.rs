pub mod conserve;
pub mod coverage;
pub mod exclude;
pub mod ledger;
pub mod log;
pub mod select;
pub mod typing;

pub use conserve::ConservationStage;
pub use coverage::CoverageStage;
pub use exclude::ExclusionStage;
pub use select::SelectionStage;
pub use typing::TypingStage;

use crate::genome::Genome;
use crate::pipeline::ledger::DiscardLedger;
use crate::pipeline::log::StageLog;
use crate::Result;
use std::path::PathBuf;
use tracing::info;

/// Per-execution dependencies handed to a stage by the pipeline: the
/// stage's dedicated log sink, its discard ledger, and the run's output
/// directory.
pub struct StageContext {
    pub output_dir: PathBuf,
    pub log: StageLog,
    pub discards: DiscardLedger,
    pub quiet: bool,
}

/// One pipeline step: a pure transform from an input candidate set to an
/// output candidate set. Returning `None` signals an empty result; the
/// pipeline still advances, handing later stages an empty set.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(&self, input: Genome, ctx: &StageContext) -> Result<Option<Genome>>;
}

#[derive(Debug, Clone)]
pub struct StageSummary {
    pub name: String,
    pub input: usize,
    pub output: usize,
    pub discarded: usize,
}

/// Result of a full pipeline run: the surviving candidate set plus
/// per-stage counts for reporting.
pub struct PipelineOutcome {
    pub candidates: Genome,
    pub stages: Vec<StageSummary>,
}

/// Ordered stage list threading one candidate Genome through every stage.
///
/// Around each stage the pipeline opens the stage's log sink and discard
/// ledger, runs the transform, closes both, and persists the surviving
/// candidate snapshot as `<stage>.txt` under the output directory.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    output_dir: PathBuf,
    quiet: bool,
}

impl Pipeline {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            stages: Vec::new(),
            output_dir: output_dir.into(),
            quiet: false,
        }
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn add_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub fn run(&self, initial: Genome) -> Result<PipelineOutcome> {
        std::fs::create_dir_all(&self.output_dir)?;

        let mut current = initial;
        let mut summaries = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let name = stage.name();
            let input_count = current.len();
            let candidate_id = current.id().to_string();

            // pre-execute: open the stage's dedicated sinks
            let ctx = StageContext {
                output_dir: self.output_dir.clone(),
                log: StageLog::open(&self.output_dir, name)?,
                discards: DiscardLedger::open(&self.output_dir, name)?,
                quiet: self.quiet,
            };
            ctx.log
                .line(&format!("{} started with {} candidates", name, input_count));
            info!(stage = name, candidates = input_count, "stage started");

            let result = stage.execute(current, &ctx)?;

            // post-execute: close sinks, then persist the snapshot
            let StageContext { log, discards, .. } = ctx;
            let output = match result {
                Some(genome) => genome,
                None => Genome::new(candidate_id, true),
            };
            log.line(&format!(
                "{} finished with {} candidates",
                name,
                output.len()
            ));
            let discarded = discards.close()?;
            log.close()?;

            output.write_to(self.output_dir.join(format!("{}.txt", name)))?;
            info!(
                stage = name,
                candidates = output.len(),
                discarded,
                "stage finished"
            );

            summaries.push(StageSummary {
                name: name.to_string(),
                input: input_count,
                output: output.len(),
                discarded,
            });
            current = output;
        }

        Ok(PipelineOutcome {
            candidates: current,
            stages: summaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::sequence::{Sequence, Strand};

    struct KeepStage;

    impl Stage for KeepStage {
        fn name(&self) -> &'static str {
            "keep"
        }

        fn execute(&self, input: Genome, ctx: &StageContext) -> Result<Option<Genome>> {
            ctx.log.line("keeping everything");
            Ok(Some(input))
        }
    }

    struct DropStage;

    impl Stage for DropStage {
        fn name(&self) -> &'static str {
            "drop"
        }

        fn execute(&self, _input: Genome, _ctx: &StageContext) -> Result<Option<Genome>> {
            Ok(None)
        }
    }

    fn one_candidate() -> Genome {
        let mut genome = Genome::new("candidates", true);
        genome.add_all([
            Sequence::new("TTTACCCCCAAAAACCCCCAAAAG", Strand::Forward, 0, "ref").unwrap()
        ]);
        genome
    }

    #[test]
    fn test_pipeline_threads_candidates_through_stages() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(dir.path()).add_stage(KeepStage);
        let outcome = pipeline.run(one_candidate()).unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.stages.len(), 1);
        assert_eq!(outcome.stages[0].input, 1);
        assert_eq!(outcome.stages[0].output, 1);
        assert!(dir.path().join("keep.txt").exists());
        assert!(dir.path().join("keep.discards.txt").exists());

        // The stage's log sink gets the open/close lines around execute
        let log = std::fs::read_to_string(dir.path().join("keep.log")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("keep started with 1 candidates"));
        assert!(lines[1].contains("keeping everything"));
        assert!(lines[2].contains("keep finished with 1 candidates"));
    }

    #[test]
    fn test_empty_result_advances_with_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(dir.path())
            .add_stage(DropStage)
            .add_stage(KeepStage);
        let outcome = pipeline.run(one_candidate()).unwrap();
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.stages.len(), 2);
        assert_eq!(outcome.stages[1].input, 0);
        // The empty snapshot still gets persisted for both stages
        let drop_snapshot = std::fs::read_to_string(dir.path().join("drop.txt")).unwrap();
        assert!(drop_snapshot.is_empty());
    }
}
