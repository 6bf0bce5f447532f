use crate::{CriselError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Total window length: 4-base PAM followed by the 20-base target.
pub const SEQUENCE_LEN: usize = 24;
/// PAM occupies the first four bases of the window.
pub const PAM_RANGE: std::ops::Range<usize> = 0..4;
/// Target region paired against the genomic locus.
pub const TARGET_RANGE: std::ops::Range<usize> = 4..24;
/// Seed: the PAM-proximal third of the target, least tolerant to mismatch.
pub const SEED_RANGE: std::ops::Range<usize> = 4..10;
/// Tail: the PAM-distal remainder of the target.
pub const TAIL_RANGE: std::ops::Range<usize> = 10..24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Complement,
}

impl Strand {
    pub fn flipped(self) -> Self {
        match self {
            Strand::Forward => Strand::Complement,
            Strand::Complement => Strand::Forward,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Complement => '-',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Forward),
            '-' => Some(Strand::Complement),
            _ => None,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One 24-base guide window on one strand of one genome.
///
/// Equality and hashing consider only the raw text, so windows cut from
/// different positions, strands, or genomes collapse under deduplication.
/// The natural ordering is (genome id, strand, start index), with the
/// complement strand sorting after forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    raw: String,
    strand: Strand,
    start: usize,
    genome: String,
    gc_count: usize,
}

fn complement_base(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'T' => b'A',
        b'G' => b'C',
        b'C' => b'G',
        other => other,
    }
}

impl Sequence {
    pub fn new(
        raw: impl Into<String>,
        strand: Strand,
        start: usize,
        genome: impl Into<String>,
    ) -> Result<Self> {
        let raw = raw.into();
        if raw.len() != SEQUENCE_LEN {
            return Err(CriselError::Genome(format!(
                "guide window must be exactly {} bases, got {} ({:?})",
                SEQUENCE_LEN,
                raw.len(),
                raw
            )));
        }
        let gc_count = raw.as_bytes()[TARGET_RANGE]
            .iter()
            .filter(|&&b| b == b'G' || b == b'C')
            .count();
        Ok(Self {
            raw,
            strand,
            start,
            genome: genome.into(),
            gc_count,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn genome(&self) -> &str {
        &self.genome
    }

    /// The 4-base PAM prefix of the window.
    pub fn pam(&self) -> &[u8] {
        &self.bytes()[PAM_RANGE]
    }

    /// The 20-base target region.
    pub fn target(&self) -> &[u8] {
        &self.bytes()[TARGET_RANGE]
    }

    /// The 6-base seed region of the target.
    pub fn seed(&self) -> &[u8] {
        &self.bytes()[SEED_RANGE]
    }

    /// The PAM-distal tail of the target.
    pub fn tail(&self) -> &[u8] {
        &self.bytes()[TAIL_RANGE]
    }

    /// G/C count within the target region, computed at construction.
    pub fn gc_count(&self) -> usize {
        self.gc_count
    }

    /// Reverse-complement of this window.
    ///
    /// Substitutes each base (A<->T, G<->C, anything else passes through),
    /// reverses the text, flips the strand flag, and relocates the start
    /// index to the window's opposite end in forward-strand coordinates.
    /// Applying it twice restores the original raw text and coordinate.
    pub fn complement(&self) -> Self {
        let raw: String = self
            .bytes()
            .iter()
            .rev()
            .map(|&b| complement_base(b) as char)
            .collect();
        let gc_count = raw.as_bytes()[TARGET_RANGE]
            .iter()
            .filter(|&&b| b == b'G' || b == b'C')
            .count();
        let start = match self.strand {
            Strand::Forward => self.start + (SEQUENCE_LEN - 1),
            Strand::Complement => self.start.saturating_sub(SEQUENCE_LEN - 1),
        };
        Self {
            raw,
            strand: self.strand.flipped(),
            start,
            genome: self.genome.clone(),
            gc_count,
        }
    }

    /// Serialized form: `raw strand startIndex genomeId`.
    pub fn to_line(&self) -> String {
        format!("{} {} {} {}", self.raw, self.strand, self.start, self.genome)
    }

    /// Parse a line previously produced by [`Sequence::to_line`].
    pub fn from_line(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let raw = fields
            .next()
            .ok_or_else(|| CriselError::Parse(format!("empty sequence line: {:?}", line)))?;
        let strand = fields
            .next()
            .and_then(|s| s.chars().next())
            .and_then(Strand::from_symbol)
            .ok_or_else(|| CriselError::Parse(format!("bad strand field in line: {:?}", line)))?;
        let start = fields
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| CriselError::Parse(format!("bad start field in line: {:?}", line)))?;
        let genome = fields
            .next()
            .ok_or_else(|| CriselError::Parse(format!("missing genome field in line: {:?}", line)))?;
        Sequence::new(raw, strand, start, genome)
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Sequence {}

impl Hash for Sequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Sequence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sequence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.genome
            .cmp(&other.genome)
            .then(self.strand.cmp(&other.strand))
            .then(self.start.cmp(&other.start))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
