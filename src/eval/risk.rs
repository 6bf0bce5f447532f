use crate::bio::sequence::{Sequence, PAM_RANGE, SEED_RANGE, SEQUENCE_LEN, TAIL_RANGE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain-tuned classification thresholds.
///
/// These values came tuned with the assay and carry no derivation of their
/// own; they are configuration, not constants to be second-guessed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Hits with at most this many total mismatches force a discard.
    pub discard_max_mismatches: usize,
    /// PAM tier triggers at this many PAM-region mismatches.
    pub pam_tier_min: usize,
    /// Seed tier triggers at this long a consecutive seed mismatch run.
    pub seed_run_min: usize,
    /// Hits with at least this many total mismatches are negligible.
    pub mismatch_ceiling: usize,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            discard_max_mismatches: 1,
            pam_tier_min: 2,
            seed_run_min: 2,
            mismatch_ceiling: 9,
        }
    }
}

/// Severity bucket assigned to an off-target hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    /// Too dissimilar to bind; lowest tier.
    Negligible,
    /// PAM region disrupted.
    Pam,
    /// Consecutive seed mismatches disrupt binding initiation.
    Seed,
    /// PAM and seed disruption together.
    PamSeed,
}

impl RiskTier {
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Negligible => "negligible",
            RiskTier::Pam => "pam",
            RiskTier::Seed => "seed",
            RiskTier::PamSeed => "pam+seed",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "negligible" => Some(RiskTier::Negligible),
            "pam" => Some(RiskTier::Pam),
            "seed" => Some(RiskTier::Seed),
            "pam+seed" => Some(RiskTier::PamSeed),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome of classifying one off-target hit against a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskCall {
    /// Near-identical hit: the candidate must be eliminated.
    Discard,
    /// Zero or more severity tiers to accumulate for the candidate.
    Tiers(Vec<RiskTier>),
}

/// Mismatch profile of a single hit, broken out by window region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MismatchProfile {
    pub total: usize,
    pub pam: usize,
    pub longest_seed_run: usize,
    pub tail: usize,
}

/// Classifies genome windows by how severely they cross-react with a bound
/// candidate guide. Bind a fresh copy per candidate before a parallel pass.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    reference: String,
    thresholds: RiskThresholds,
}

impl RiskClassifier {
    pub fn new(reference: &Sequence, thresholds: RiskThresholds) -> Self {
        Self {
            reference: reference.raw().to_string(),
            thresholds,
        }
    }

    pub fn for_reference(&self, reference: &Sequence) -> Self {
        Self {
            reference: reference.raw().to_string(),
            thresholds: self.thresholds,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "risk tiers vs {} (discard <= {} mismatches, ceiling {})",
            self.reference,
            self.thresholds.discard_max_mismatches,
            self.thresholds.mismatch_ceiling
        )
    }

    /// Region-by-region mismatch counts of `hit` against the bound reference.
    pub fn assess(&self, hit: &Sequence) -> MismatchProfile {
        let reference = self.reference.as_bytes();
        let candidate = hit.bytes();

        let mismatch = |pos: usize| reference[pos] != candidate[pos];

        let total = (0..SEQUENCE_LEN).filter(|&p| mismatch(p)).count();
        let pam = PAM_RANGE.filter(|&p| mismatch(p)).count();
        let tail = TAIL_RANGE.filter(|&p| mismatch(p)).count();

        let mut longest_seed_run = 0usize;
        let mut current = 0usize;
        for p in SEED_RANGE {
            if mismatch(p) {
                current += 1;
                longest_seed_run = longest_seed_run.max(current);
            } else {
                current = 0;
            }
        }

        MismatchProfile {
            total,
            pam,
            longest_seed_run,
            tail,
        }
    }

    /// Classify one hit: a discard signal for near-identical windows, the
    /// negligible tier past the mismatch ceiling, otherwise the PAM and/or
    /// seed tiers (plus the combined tier when both trigger).
    pub fn classify(&self, hit: &Sequence) -> RiskCall {
        let profile = self.assess(hit);

        if profile.total <= self.thresholds.discard_max_mismatches {
            return RiskCall::Discard;
        }
        if profile.total >= self.thresholds.mismatch_ceiling {
            return RiskCall::Tiers(vec![RiskTier::Negligible]);
        }

        let pam_hit = profile.pam >= self.thresholds.pam_tier_min;
        let seed_hit = profile.longest_seed_run >= self.thresholds.seed_run_min;

        let mut tiers = Vec::new();
        if pam_hit {
            tiers.push(RiskTier::Pam);
        }
        if seed_hit {
            tiers.push(RiskTier::Seed);
        }
        if pam_hit && seed_hit {
            tiers.push(RiskTier::PamSeed);
        }
        RiskCall::Tiers(tiers)
    }
}
