use crate::config::SelectionConfig;
use crate::eval::Evaluator;
use crate::genome::Genome;
use crate::pipeline::{Stage, StageContext};
use crate::{CriselError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

/// Builds the initial candidate set from the reference genome files.
///
/// Windows are filtered at construction time by the PAM, GC-content and
/// no-run rules; multiple reference files either union their window sets or,
/// when configured as a chromosome set, are concatenated before windowing.
pub struct SelectionStage {
    files: Vec<PathBuf>,
    config: SelectionConfig,
}

impl SelectionStage {
    pub fn new(files: Vec<PathBuf>, config: SelectionConfig) -> Self {
        Self { files, config }
    }

    fn evaluators(&self) -> Vec<Evaluator> {
        vec![
            Evaluator::pam(),
            Evaluator::gc_content(self.config.gc_min, self.config.gc_max),
            Evaluator::no_run(self.config.run_length),
        ]
    }
}

impl Stage for SelectionStage {
    fn name(&self) -> &'static str {
        "selection"
    }

    fn execute(&self, input: Genome, ctx: &StageContext) -> Result<Option<Genome>> {
        if self.files.is_empty() {
            return Err(CriselError::Pipeline(
                "selection needs at least one reference genome file".to_string(),
            ));
        }

        let evaluators = self.evaluators();
        for evaluator in &evaluators {
            ctx.log.line(&format!("rule: {}", evaluator.describe()));
        }

        if self.config.merge_chromosomes {
            ctx.log.line(&format!(
                "windowing {} files as one merged chromosome set",
                self.files.len()
            ));
            let mut candidates = Genome::new(input.id(), true);
            candidates.merge(Genome::from_files_merged(&self.files, &evaluators, true)?);
            ctx.log
                .line(&format!("selected {} candidates", candidates.len()));
            return Ok(Some(candidates));
        }

        let pb = if ctx.quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(self.files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("##-"),
            );
            pb.set_message("Selecting candidates");
            pb
        };

        let mut candidates = Genome::new(input.id(), true);
        for file in &self.files {
            let windows = Genome::from_file(file, &evaluators, true)?;
            ctx.log.line(&format!(
                "{}: {} compliant windows",
                windows.id(),
                windows.len()
            ));
            info!(genome = windows.id(), windows = windows.len(), "selected");
            candidates.merge(windows);
            pb.inc(1);
        }
        pb.finish_with_message(format!("Selected {} candidates", candidates.len()));

        ctx.log
            .line(&format!("selected {} candidates", candidates.len()));
        Ok(Some(candidates))
    }
}
