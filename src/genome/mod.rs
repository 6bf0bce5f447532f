use crate::bio::fasta;
use crate::bio::sequence::{Sequence, Strand, SEQUENCE_LEN};
use crate::eval::Evaluator;
use crate::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// The deduplicated (or raw) guide-window set of one organism.
///
/// Holds one pool per strand plus, in deduplicating mode, a raw-text index
/// backing O(1) membership queries. The candidate set that flows through
/// the pipeline is a `Genome`, as is every auxiliary strain/off-target
/// genome built for a single stage iteration.
#[derive(Debug)]
pub struct Genome {
    id: String,
    forward: Vec<Sequence>,
    complement: Vec<Sequence>,
    index: Option<HashSet<String>>,
}

impl Genome {
    /// An empty genome. With `dedup` the genome indexes raw texts, keeps
    /// only the first occurrence of each, and can answer [`Genome::exists`].
    pub fn new(id: impl Into<String>, dedup: bool) -> Self {
        Self {
            id: id.into(),
            forward: Vec::new(),
            complement: Vec::new(),
            index: dedup.then(HashSet::new),
        }
    }

    /// Window `body` into guide candidates.
    ///
    /// Every offset yields one forward and one reverse-complement window;
    /// each is kept only if all `evaluators` accept it. Window evaluation
    /// runs in parallel across offsets; the deduplication commit is a
    /// sequential pass in offset order so "first occurrence wins" is
    /// deterministic.
    pub fn from_text(
        id: impl Into<String>,
        body: &str,
        evaluators: &[Evaluator],
        dedup: bool,
    ) -> Result<Self> {
        let id = id.into();
        let mut genome = Genome::new(id.clone(), dedup);

        if body.len() < SEQUENCE_LEN {
            debug!(genome = %id, len = body.len(), "body shorter than one window");
            return Ok(genome);
        }

        let offsets = 0..=(body.len() - SEQUENCE_LEN);
        let windows: Result<Vec<(Option<Sequence>, Option<Sequence>)>> = offsets
            .into_par_iter()
            .map(|start| {
                let forward = Sequence::new(
                    &body[start..start + SEQUENCE_LEN],
                    Strand::Forward,
                    start,
                    id.as_str(),
                )?;
                let complement = forward.complement();
                let keep = |s: &Sequence| evaluators.iter().all(|e| e.evaluate(s));
                let fwd = keep(&forward).then_some(forward);
                let comp = keep(&complement).then_some(complement);
                Ok((fwd, comp))
            })
            .collect();

        for (fwd, comp) in windows? {
            if let Some(s) = fwd {
                genome.push(s);
            }
            if let Some(s) = comp {
                genome.push(s);
            }
        }

        debug!(
            genome = %genome.id,
            forward = genome.forward.len(),
            complement = genome.complement.len(),
            "windowed genome"
        );
        Ok(genome)
    }

    /// Build from a primary-chromosome FASTA file. The genome id is derived
    /// from the file name.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        evaluators: &[Evaluator],
        dedup: bool,
    ) -> Result<Self> {
        let body = fasta::read_genome_body(&path)?;
        Genome::from_text(fasta::genome_id(&path), &body, evaluators, dedup)
    }

    /// Build from a chromosome set, concatenated in chromosome order before
    /// windowing. The genome id comes from the first file given.
    pub fn from_files_merged<P: AsRef<Path>>(
        paths: &[P],
        evaluators: &[Evaluator],
        dedup: bool,
    ) -> Result<Self> {
        let body = fasta::read_genome_merged(paths)?;
        let id = fasta::genome_id(&paths[0]);
        Genome::from_text(id, &body, evaluators, dedup)
    }

    fn push(&mut self, sequence: Sequence) {
        if let Some(index) = &mut self.index {
            if !index.insert(sequence.raw().to_string()) {
                return;
            }
        }
        match sequence.strand() {
            Strand::Forward => self.forward.push(sequence),
            Strand::Complement => self.complement.push(sequence),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.forward.len() + self.complement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.complement.is_empty()
    }

    pub fn is_dedup(&self) -> bool {
        self.index.is_some()
    }

    /// All sequences, forward pool then complement pool.
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.forward.iter().chain(self.complement.iter())
    }

    /// O(1) membership by raw text.
    ///
    /// Panics if this genome was not built in deduplicating mode: such a
    /// call is a defect in the calling code, not a data condition.
    pub fn exists(&self, sequence: &Sequence) -> bool {
        self.index
            .as_ref()
            .unwrap_or_else(|| {
                panic!(
                    "exists() called on genome {:?} which was not built in deduplicating mode",
                    self.id
                )
            })
            .contains(sequence.raw())
    }

    /// All sequences accepted by every evaluator. Scans both pools in
    /// parallel.
    pub fn matching_all(&self, evaluators: &[Evaluator]) -> Vec<&Sequence> {
        self.par_filter(|s| evaluators.iter().all(|e| e.evaluate(s)))
    }

    /// All sequences accepted by at least one evaluator.
    pub fn matching_any(&self, evaluators: &[Evaluator]) -> Vec<&Sequence> {
        self.par_filter(|s| evaluators.iter().any(|e| e.evaluate(s)))
    }

    /// The first sequence (forward pool first, offset order) accepted by
    /// every evaluator.
    pub fn first_matching(&self, evaluators: &[Evaluator]) -> Option<&Sequence> {
        let accept = |s: &&Sequence| evaluators.iter().all(|e| e.evaluate(s));
        self.forward
            .par_iter()
            .find_first(accept)
            .or_else(|| self.complement.par_iter().find_first(accept))
    }

    fn par_filter<F>(&self, predicate: F) -> Vec<&Sequence>
    where
        F: Fn(&Sequence) -> bool + Sync,
    {
        // chain() of two indexed parallel iterators preserves pool order
        self.forward
            .par_iter()
            .chain(self.complement.par_iter())
            .filter(|s| predicate(s))
            .collect()
    }

    /// Remove every sequence equal (by raw text) to a member of `discard`,
    /// keeping the index consistent.
    pub fn remove_all(&mut self, discard: &HashSet<Sequence>) {
        if discard.is_empty() {
            return;
        }
        self.forward.retain(|s| !discard.contains(s));
        self.complement.retain(|s| !discard.contains(s));
        if let Some(index) = &mut self.index {
            for gone in discard {
                index.remove(gone.raw());
            }
        }
    }

    /// Bulk insert, honoring deduplication when enabled.
    pub fn add_all(&mut self, sequences: impl IntoIterator<Item = Sequence>) {
        for s in sequences {
            self.push(s);
        }
    }

    /// Union another genome's sequences into this one.
    pub fn merge(&mut self, other: Genome) {
        self.add_all(other.forward);
        self.add_all(other.complement);
    }

    /// Sequences sorted by the natural ordering (genome id, strand, start).
    pub fn sorted(&self) -> Vec<&Sequence> {
        let mut all: Vec<&Sequence> = self.sequences().collect();
        all.sort_by(|a, b| a.cmp(b));
        all
    }

    /// Write the sorted snapshot, one `raw strand startIndex genomeId` line
    /// per sequence.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for sequence in self.sorted() {
            writeln!(writer, "{}", sequence.to_line())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a snapshot previously written by [`Genome::write_to`].
    pub fn load<P: AsRef<Path>>(id: impl Into<String>, path: P, dedup: bool) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut genome = Genome::new(id, dedup);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            genome.push(Sequence::from_line(&line)?);
        }
        Ok(genome)
    }
}
