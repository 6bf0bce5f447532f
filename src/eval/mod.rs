pub mod risk;

pub use risk::{RiskCall, RiskClassifier, RiskThresholds, RiskTier};

use crate::bio::sequence::{Sequence, SEQUENCE_LEN, TARGET_RANGE};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

fn hash_region(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Whether a position-count rule counts agreeing or disagreeing positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMode {
    Matches,
    Mismatches,
}

/// The closed family of comparison rules applied to candidate windows.
///
/// Every variant carries its parameters as plain data and is evaluated by
/// pattern matching. Variants bound to a fixed reference are re-bound with
/// [`Evaluator::for_reference`] before each parallel pass so no match state
/// is ever shared across workers.
#[derive(Debug, Clone)]
pub enum Evaluator {
    /// Cas12a PAM shape: three leading `T`s, fourth base anything but `T`.
    /// In strict mode the whole PAM must also equal the bound reference PAM.
    Pam { strict: Option<[u8; 4]> },
    /// Target-region G/C count within an inclusive range.
    GcContent { min: usize, max: usize },
    /// Rejects any run of `run_length` identical bases in the target region.
    NoRun { run_length: usize },
    /// Raw text equals the bound reference.
    ExactMatch { reference: String },
    /// PAM-region and seed-region hashes both equal the bound reference's.
    /// Cheap pre-filter before character-level comparison.
    PamSeed { pam_hash: u64, seed_hash: u64 },
    /// Counts matching or mismatching positions against the bound reference,
    /// optionally restricted to a union of index sub-ranges, and succeeds
    /// iff the count falls in `count_min..=count_max`.
    RangeCount {
        mode: CountMode,
        reference: String,
        regions: Vec<Range<usize>>,
        count_min: usize,
        count_max: usize,
    },
}

impl Evaluator {
    pub fn pam() -> Self {
        Evaluator::Pam { strict: None }
    }

    pub fn pam_strict(reference: &Sequence) -> Self {
        let mut pam = [0u8; 4];
        pam.copy_from_slice(reference.pam());
        Evaluator::Pam { strict: Some(pam) }
    }

    pub fn gc_content(min: usize, max: usize) -> Self {
        Evaluator::GcContent { min, max }
    }

    pub fn no_run(run_length: usize) -> Self {
        Evaluator::NoRun { run_length }
    }

    pub fn exact_match(reference: &Sequence) -> Self {
        Evaluator::ExactMatch {
            reference: reference.raw().to_string(),
        }
    }

    pub fn pam_seed(reference: &Sequence) -> Self {
        Evaluator::PamSeed {
            pam_hash: hash_region(reference.pam()),
            seed_hash: hash_region(reference.seed()),
        }
    }

    pub fn matches_within(
        reference: &Sequence,
        regions: Vec<Range<usize>>,
        count_min: usize,
        count_max: usize,
    ) -> Self {
        Evaluator::RangeCount {
            mode: CountMode::Matches,
            reference: reference.raw().to_string(),
            regions,
            count_min,
            count_max,
        }
    }

    pub fn mismatches_within(
        reference: &Sequence,
        regions: Vec<Range<usize>>,
        count_min: usize,
        count_max: usize,
    ) -> Self {
        Evaluator::RangeCount {
            mode: CountMode::Mismatches,
            reference: reference.raw().to_string(),
            regions,
            count_min,
            count_max,
        }
    }

    /// Loose-binding rule used by the typing scan: at least `min_matches`
    /// agreeing positions within the target region.
    pub fn target_matches_at_least(reference: &Sequence, min_matches: usize) -> Self {
        Evaluator::matches_within(
            reference,
            vec![TARGET_RANGE],
            min_matches,
            TARGET_RANGE.len(),
        )
    }

    /// A copy of this rule re-bound to a new fixed reference.
    ///
    /// Parameter-only rules are returned unchanged; reference-bound rules
    /// take their reference data from `reference`.
    pub fn for_reference(&self, reference: &Sequence) -> Evaluator {
        match self {
            Evaluator::Pam { strict: Some(_) } => Evaluator::pam_strict(reference),
            Evaluator::Pam { strict: None } => self.clone(),
            Evaluator::GcContent { .. } => self.clone(),
            Evaluator::NoRun { .. } => self.clone(),
            Evaluator::ExactMatch { .. } => Evaluator::exact_match(reference),
            Evaluator::PamSeed { .. } => Evaluator::pam_seed(reference),
            Evaluator::RangeCount {
                mode,
                regions,
                count_min,
                count_max,
                ..
            } => Evaluator::RangeCount {
                mode: *mode,
                reference: reference.raw().to_string(),
                regions: regions.clone(),
                count_min: *count_min,
                count_max: *count_max,
            },
        }
    }

    pub fn evaluate(&self, candidate: &Sequence) -> bool {
        match self {
            Evaluator::Pam { strict } => {
                let pam = candidate.pam();
                let shape_ok = pam[..3].iter().all(|&b| b == b'T') && pam[3] != b'T';
                match strict {
                    Some(reference) => shape_ok && pam == reference,
                    None => shape_ok,
                }
            }
            Evaluator::GcContent { min, max } => {
                let gc = candidate.gc_count();
                gc >= *min && gc <= *max
            }
            Evaluator::NoRun { run_length } => {
                !has_run(&candidate.bytes()[TARGET_RANGE], *run_length)
            }
            Evaluator::ExactMatch { reference } => candidate.raw() == reference,
            Evaluator::PamSeed { pam_hash, seed_hash } => {
                hash_region(candidate.pam()) == *pam_hash
                    && hash_region(candidate.seed()) == *seed_hash
            }
            Evaluator::RangeCount {
                mode,
                reference,
                regions,
                count_min,
                count_max,
            } => {
                let count = count_positions(reference.as_bytes(), candidate.bytes(), regions, *mode);
                count >= *count_min && count <= *count_max
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Evaluator::Pam { strict: None } => "PAM is TTTV".to_string(),
            Evaluator::Pam { strict: Some(p) } => {
                format!("PAM is TTTV and equals {}", String::from_utf8_lossy(p))
            }
            Evaluator::GcContent { min, max } => {
                format!("target GC count in {}..={}", min, max)
            }
            Evaluator::NoRun { run_length } => {
                format!("no run of {} identical bases in target", run_length)
            }
            Evaluator::ExactMatch { reference } => format!("exactly matches {}", reference),
            Evaluator::PamSeed { .. } => "PAM and seed hashes match reference".to_string(),
            Evaluator::RangeCount {
                mode,
                count_min,
                count_max,
                regions,
                ..
            } => {
                let what = match mode {
                    CountMode::Matches => "matches",
                    CountMode::Mismatches => "mismatches",
                };
                let scope = if regions.is_empty() {
                    "full window".to_string()
                } else {
                    regions
                        .iter()
                        .map(|r| format!("{}..{}", r.start, r.end))
                        .collect::<Vec<_>>()
                        .join(",")
                };
                format!("{} in {} within {}..={}", what, scope, count_min, count_max)
            }
        }
    }
}

fn has_run(region: &[u8], run_length: usize) -> bool {
    if run_length == 0 {
        return false;
    }
    let mut current = 0usize;
    let mut previous = 0u8;
    for &b in region {
        if b == previous {
            current += 1;
        } else {
            previous = b;
            current = 1;
        }
        if current >= run_length {
            return true;
        }
    }
    false
}

fn count_positions(reference: &[u8], candidate: &[u8], regions: &[Range<usize>], mode: CountMode) -> usize {
    let in_scope = |pos: usize| regions.is_empty() || regions.iter().any(|r| r.contains(&pos));
    (0..SEQUENCE_LEN)
        .filter(|&pos| in_scope(pos))
        .filter(|&pos| {
            let agree = reference[pos] == candidate[pos];
            match mode {
                CountMode::Matches => agree,
                CountMode::Mismatches => !agree,
            }
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::sequence::Strand;
    use test_case::test_case;

    fn seq(raw: &str) -> Sequence {
        Sequence::new(raw, Strand::Forward, 0, "test").unwrap()
    }

    #[test_case("TTTACCCCCAAAAACCCCCAAAAG", true; "canonical tttv pam")]
    #[test_case("TTTCCCCCCAAAAACCCCCAAAAG", true; "tttc pam")]
    #[test_case("TTTTCCCCCAAAAACCCCCAAAAG", false; "fourth base t rejected")]
    #[test_case("ATTACCCCCAAAAACCCCCAAAAG", false; "leading non t rejected")]
    #[test_case("TATACCCCCAAAAACCCCCAAAAG", false; "second base non t rejected")]
    fn test_pam_rule(raw: &str, expected: bool) {
        assert_eq!(Evaluator::pam().evaluate(&seq(raw)), expected);
    }

    #[test]
    fn test_pam_strict_requires_reference_pam() {
        let reference = seq("TTTACCCCCAAAAACCCCCAAAAG");
        let strict = Evaluator::pam_strict(&reference);
        assert!(strict.evaluate(&seq("TTTACCCCCTTTTTCCCCCTTTTG")));
        // Valid TTTV shape but different fourth base
        assert!(!strict.evaluate(&seq("TTTCCCCCCAAAAACCCCCAAAAG")));
    }

    #[test_case("TTTAGCGCGCGCGTTTTTTTTTTT", true; "gc count 9 accepted")]
    #[test_case("TTTAGCGCGCGCTTTTTTTTTTTT", false; "gc count 8 rejected")]
    #[test_case("TTTAGCGCGCGCGCGTTTTTTTTT", true; "gc count 11 at upper bound")]
    #[test_case("TTTAGCGCGCGCGCGCTTTTTTTT", false; "gc count 12 rejected")]
    fn test_gc_rule_default_range(raw: &str, expected: bool) {
        assert_eq!(Evaluator::gc_content(9, 11).evaluate(&seq(raw)), expected);
    }

    #[test]
    fn test_no_run_rule() {
        let rule = Evaluator::no_run(4);
        assert!(rule.evaluate(&seq("TTTAGCGCACGTGCATGCATACGT")));
        assert!(!rule.evaluate(&seq("TTTAGCGCAAAAGCATGCATACGT")));
        // Run entirely inside the PAM does not count against the target
        assert!(Evaluator::no_run(3).evaluate(&seq("TTTAGCGCACGTGCATGCATACGT")));
    }

    #[test]
    fn test_exact_match_rule() {
        let reference = seq("TTTACCCCCAAAAACCCCCAAAAG");
        let rule = Evaluator::exact_match(&reference);
        assert!(rule.evaluate(&seq("TTTACCCCCAAAAACCCCCAAAAG")));
        assert!(!rule.evaluate(&reference.complement()));
        assert!(!rule.evaluate(&seq("ATTACCCCCAAAAACCCCCAAAAG")));
    }

    #[test]
    fn test_pam_seed_prefilter() {
        let reference = seq("TTTACCCCCAAAAACCCCCAAAAG");
        let rule = Evaluator::pam_seed(&reference);
        // Same PAM and seed, different tail
        assert!(rule.evaluate(&seq("TTTACCCCCAGGGGGCCCCCAAAT")));
        // Seed differs
        assert!(!rule.evaluate(&seq("TTTACCCCGAAAAACCCCCAAAAG")));
        // PAM differs
        assert!(!rule.evaluate(&seq("TTTGCCCCCAAAAACCCCCAAAAG")));
    }

    #[test]
    fn test_range_mismatch_full_window() {
        let reference = seq("TTTACCCCCAAAAACCCCCAAAAG");
        let exact = Evaluator::mismatches_within(&reference, vec![], 0, 0);
        assert!(exact.evaluate(&seq("TTTACCCCCAAAAACCCCCAAAAG")));

        // Each single-position substitution is exactly one mismatch
        let one = Evaluator::mismatches_within(&reference, vec![], 1, 1);
        for pos in 0..SEQUENCE_LEN {
            let mut raw = reference.raw().as_bytes().to_vec();
            raw[pos] = if raw[pos] == b'A' { b'G' } else { b'A' };
            let mutated = seq(std::str::from_utf8(&raw).unwrap());
            assert!(one.evaluate(&mutated), "position {}", pos);
            assert!(!exact.evaluate(&mutated), "position {}", pos);
        }
    }

    #[test]
    fn test_range_count_inclusive_bounds() {
        let reference = seq("TTTACCCCCAAAAACCCCCAAAAG");
        // Three mismatches against the reference
        let candidate = seq("TTTACCCCCAAAAACCCCCATTTG");
        assert!(Evaluator::mismatches_within(&reference, vec![], 3, 3).evaluate(&candidate));
        assert!(Evaluator::mismatches_within(&reference, vec![], 2, 4).evaluate(&candidate));
        assert!(!Evaluator::mismatches_within(&reference, vec![], 0, 2).evaluate(&candidate));
        assert!(!Evaluator::mismatches_within(&reference, vec![], 4, 10).evaluate(&candidate));
    }

    #[test]
    fn test_range_count_region_union() {
        let reference = seq("TTTACCCCCAAAAACCCCCAAAAG");
        // Mismatches at 0 (PAM), 9 (seed), 20 (tail)
        let candidate = seq("ATTACCCCCGAAAACCCCCATAAG");
        let pam_only = Evaluator::mismatches_within(&reference, vec![0..4], 1, 1);
        assert!(pam_only.evaluate(&candidate));
        let pam_and_seed = Evaluator::mismatches_within(&reference, vec![0..4, 4..10], 2, 2);
        assert!(pam_and_seed.evaluate(&candidate));
    }

    #[test]
    fn test_target_matches_at_least() {
        let reference = seq("TTTACCCCCAAAAACCCCCAAAAG");
        let rule = Evaluator::target_matches_at_least(&reference, 14);
        assert!(rule.evaluate(&seq("TTTACCCCCAAAAACCCCCAAAAG")));
        // Six target mismatches leaves exactly 14 matches
        assert!(rule.evaluate(&seq("TTTAGGGGGGAAAACCCCCAAAAG")));
        // Seven target mismatches falls below the threshold
        assert!(!rule.evaluate(&seq("TTTAGGGGGGGAAACCCCCAAAAG")));
    }

    #[test]
    fn test_for_reference_rebinds() {
        let first = seq("TTTACCCCCAAAAACCCCCAAAAG");
        let second = seq("TTTCGGGGGTTTTTGGGGGTTTTA");
        let rule = Evaluator::exact_match(&first).for_reference(&second);
        assert!(!rule.evaluate(&first));
        assert!(rule.evaluate(&second));

        let loose = Evaluator::target_matches_at_least(&first, 14).for_reference(&second);
        assert!(loose.evaluate(&second));
    }

    #[test]
    fn test_describe_is_human_readable() {
        assert_eq!(Evaluator::pam().describe(), "PAM is TTTV");
        assert_eq!(
            Evaluator::gc_content(9, 11).describe(),
            "target GC count in 9..=11"
        );
        assert!(Evaluator::no_run(4).describe().contains("run of 4"));
    }
}
