use crate::bio::fasta;
use crate::bio::sequence::Sequence;
use crate::config::TypingConfig;
use crate::eval::{Evaluator, RiskCall, RiskClassifier, RiskTier};
use crate::genome::Genome;
use crate::pipeline::ledger::ResumeLedger;
use crate::pipeline::{Stage, StageContext};
use crate::{CriselError, Result};
use dashmap::DashMap;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Per-candidate tier table written after every completed off-target file.
pub const TIER_TABLE_FILE: &str = "typing_tiers.txt";
/// Resume ledger naming the off-target files already fully processed.
pub const PROGRESS_FILE: &str = "typing.progress.txt";

type TierCounters = DashMap<String, BTreeMap<RiskTier, u64>>;

/// Classifies surviving candidates by their closest off-target matches.
///
/// For every off-target genome, each candidate is compared (in parallel,
/// one worker per candidate) against all windows whose target region still
/// matches loosely enough to bind. Every such hit is risk-classified; tier
/// counts accumulate per candidate and a near-identical hit queues the
/// candidate for removal. Finished files are recorded in a resume ledger so
/// an interrupted run can be restarted without redoing them.
pub struct TypingStage {
    files: Vec<PathBuf>,
    config: TypingConfig,
    resume: bool,
}

impl TypingStage {
    pub fn new(files: Vec<PathBuf>, config: TypingConfig) -> Self {
        Self {
            files,
            config,
            resume: false,
        }
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }
}

impl Stage for TypingStage {
    fn name(&self) -> &'static str {
        "typing"
    }

    fn execute(&self, mut candidates: Genome, ctx: &StageContext) -> Result<Option<Genome>> {
        let table_path = ctx.output_dir.join(TIER_TABLE_FILE);
        let progress_path = ctx.output_dir.join(PROGRESS_FILE);

        if !self.resume {
            for stale in [&table_path, &progress_path] {
                if stale.exists() {
                    std::fs::remove_file(stale)?;
                }
            }
        }

        let mut done = ResumeLedger::open(progress_path)?;
        let counters: TierCounters = DashMap::new();
        if self.resume && table_path.exists() {
            load_tier_table(&table_path, &counters)?;
            ctx.log.line(&format!(
                "resuming: {} files already processed, {} candidates carry counts",
                done.len(),
                counters.len()
            ));
        }

        for file in &self.files {
            if candidates.is_empty() {
                ctx.log
                    .line("candidate set empty, skipping remaining off-target genomes");
                break;
            }

            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    CriselError::Pipeline(format!("off-target path has no file name: {:?}", file))
                })?;
            if done.is_done(&file_name) {
                ctx.log
                    .line(&format!("{}: already processed, skipping", file_name));
                continue;
            }

            let offtarget = Genome::from_file(file, &[], false)?;
            let name = fasta::genome_id(file);

            let pool: Vec<&Sequence> = candidates.sequences().collect();
            let pb = if ctx.quiet {
                ProgressBar::hidden()
            } else {
                let pb = ProgressBar::new(pool.len() as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                        .unwrap()
                        .progress_chars("##-"),
                );
                pb.set_message(format!("Typing vs {}", name));
                pb
            };

            // raw text -> removal reason, first discard signal wins
            let discards: DashMap<String, String> = DashMap::new();

            pool.par_iter().for_each(|candidate| {
                let loose =
                    Evaluator::target_matches_at_least(candidate, self.config.min_target_matches);
                let classifier = RiskClassifier::new(candidate, self.config.risk);

                for hit in offtarget.matching_all(&[loose]) {
                    match classifier.classify(hit) {
                        RiskCall::Discard => {
                            discards
                                .entry(candidate.raw().to_string())
                                .or_insert_with(|| format!("near-identical match in {}", name));
                            break;
                        }
                        RiskCall::Tiers(tiers) => {
                            if tiers.is_empty() {
                                continue;
                            }
                            let mut counts =
                                counters.entry(candidate.raw().to_string()).or_default();
                            for tier in tiers {
                                *counts.entry(tier).or_insert(0) += 1;
                            }
                        }
                    }
                }
                pb.inc(1);
            });
            pb.finish_and_clear();

            let removal: HashSet<Sequence> = pool
                .iter()
                .filter(|s| discards.contains_key(s.raw()))
                .map(|&s| s.clone())
                .collect();
            drop(pool);

            for gone in &removal {
                let reason = discards
                    .get(gone.raw())
                    .map(|r| r.clone())
                    .unwrap_or_else(|| format!("near-identical match in {}", name));
                ctx.discards.record(gone, &reason);
            }
            candidates.remove_all(&removal);

            done.mark_done(&file_name)?;
            write_tier_table(&table_path, &candidates, &counters)?;

            ctx.log.line(&format!(
                "{}: removed {}, {} candidates remain",
                name,
                removal.len(),
                candidates.len()
            ));
            info!(
                offtarget = %name,
                removed = removal.len(),
                remaining = candidates.len(),
                "typing pass"
            );
        }

        write_tier_table(&table_path, &candidates, &counters)?;

        if candidates.is_empty() {
            return Ok(None);
        }
        Ok(Some(candidates))
    }
}

/// One `raw tier=count ...` line per surviving candidate, sorted by the
/// candidate ordering. Candidates with no classified hits get a bare line.
fn write_tier_table(path: &Path, candidates: &Genome, counters: &TierCounters) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for candidate in candidates.sorted() {
        let mut line = candidate.raw().to_string();
        if let Some(counts) = counters.get(candidate.raw()) {
            for (tier, count) in counts.iter() {
                line.push_str(&format!(" {}={}", tier.label(), count));
            }
        }
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

fn load_tier_table(path: &Path, counters: &TierCounters) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let raw = match fields.next() {
            Some(raw) => raw,
            None => continue,
        };
        let mut counts = BTreeMap::new();
        for field in fields {
            let (label, count) = field.rsplit_once('=').ok_or_else(|| {
                CriselError::Parse(format!("bad tier field {:?} in {}", field, path.display()))
            })?;
            let tier = RiskTier::from_label(label).ok_or_else(|| {
                CriselError::Parse(format!("unknown tier {:?} in {}", label, path.display()))
            })?;
            let count: u64 = count.parse().map_err(|_| {
                CriselError::Parse(format!("bad tier count {:?} in {}", field, path.display()))
            })?;
            counts.insert(tier, count);
        }
        if !counts.is_empty() {
            counters.insert(raw.to_string(), counts);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::sequence::Strand;

    #[test]
    fn test_tier_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TIER_TABLE_FILE);

        let mut candidates = Genome::new("candidates", true);
        let a = Sequence::new("TTTACCCCCAAAAACCCCCAAAAG", Strand::Forward, 0, "ref").unwrap();
        let b = Sequence::new("TTTCGGGGGTTTTTGGGGGTTTTA", Strand::Forward, 30, "ref").unwrap();
        candidates.add_all([a.clone(), b.clone()]);

        let counters: TierCounters = DashMap::new();
        let mut counts = BTreeMap::new();
        counts.insert(RiskTier::Pam, 3);
        counts.insert(RiskTier::PamSeed, 1);
        counters.insert(a.raw().to_string(), counts);

        write_tier_table(&path, &candidates, &counters).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("TTTACCCCCAAAAACCCCCAAAAG pam=3 pam+seed=1"));
        // Candidate without hits still gets its bare line
        assert!(contents.contains("TTTCGGGGGTTTTTGGGGGTTTTA\n"));

        let reloaded: TierCounters = DashMap::new();
        load_tier_table(&path, &reloaded).unwrap();
        assert_eq!(reloaded.len(), 1);
        let counts = reloaded.get(a.raw()).unwrap();
        assert_eq!(counts.get(&RiskTier::Pam), Some(&3));
        assert_eq!(counts.get(&RiskTier::PamSeed), Some(&1));
    }

    #[test]
    fn test_load_tier_table_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TIER_TABLE_FILE);
        std::fs::write(&path, "TTTACCCCCAAAAACCCCCAAAAG pam=notanumber\n").unwrap();
        let counters: TierCounters = DashMap::new();
        assert!(load_tier_table(&path, &counters).is_err());
    }
}
