use crate::bio::sequence::Sequence;
use crate::Result;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records every candidate removed by a stage, one `sequence reason` line
/// per removal.
pub struct DiscardLedger {
    writer: Mutex<BufWriter<File>>,
    count: AtomicUsize,
}

impl DiscardLedger {
    pub fn open(dir: &Path, stage: &str) -> Result<Self> {
        let path = dir.join(format!("{}.discards.txt", stage));
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            count: AtomicUsize::new(0),
        })
    }

    pub fn record(&self, sequence: &Sequence, reason: &str) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{} {}", sequence.raw(), reason);
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn close(self) -> Result<usize> {
        let mut writer = self.writer.into_inner();
        writer.flush()?;
        Ok(self.count.into_inner())
    }
}

/// Tracks which off-target files a typing run has fully processed, so a
/// restarted run can skip them. Names are appended and flushed as soon as a
/// file completes.
pub struct ResumeLedger {
    path: PathBuf,
    done: HashSet<String>,
}

impl ResumeLedger {
    /// Open (or create) the ledger at `path`, loading any names a previous
    /// run already recorded.
    pub fn open(path: PathBuf) -> Result<Self> {
        let mut done = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                let name = line.trim();
                if !name.is_empty() {
                    done.insert(name.to_string());
                }
            }
        }
        Ok(Self { path, done })
    }

    pub fn is_done(&self, name: &str) -> bool {
        self.done.contains(name)
    }

    pub fn mark_done(&mut self, name: &str) -> Result<()> {
        if !self.done.insert(name.to_string()) {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", name)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::sequence::Strand;

    #[test]
    fn test_discard_ledger_records_sequence_and_reason() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DiscardLedger::open(dir.path(), "conservation").unwrap();
        let s = Sequence::new("TTTACCCCCAAAAACCCCCAAAAG", Strand::Forward, 0, "g").unwrap();
        ledger.record(&s, "not found in strain_x");
        assert_eq!(ledger.count(), 1);
        let written = ledger.close().unwrap();
        assert_eq!(written, 1);

        let contents =
            std::fs::read_to_string(dir.path().join("conservation.discards.txt")).unwrap();
        assert_eq!(
            contents.trim(),
            "TTTACCCCCAAAAACCCCCAAAAG not found in strain_x"
        );
    }

    #[test]
    fn test_resume_ledger_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typing.progress.txt");

        let mut ledger = ResumeLedger::open(path.clone()).unwrap();
        assert!(ledger.is_empty());
        ledger.mark_done("offtarget_a.fasta").unwrap();
        ledger.mark_done("offtarget_b.fasta").unwrap();
        // Marking twice writes once
        ledger.mark_done("offtarget_a.fasta").unwrap();

        let reopened = ResumeLedger::open(path.clone()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.is_done("offtarget_a.fasta"));
        assert!(reopened.is_done("offtarget_b.fasta"));
        assert!(!reopened.is_done("offtarget_c.fasta"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
