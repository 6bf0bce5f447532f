use crate::Result;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Dedicated log sink for one stage execution.
///
/// Each stage gets its own file, opened by the pipeline before `execute`
/// and closed after, and written through a mutex so parallel workers can
/// log safely. Passing the sink in explicitly replaces the process-wide
/// handler swap the pipeline would otherwise need.
pub struct StageLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl StageLog {
    pub fn open(dir: &Path, stage: &str) -> Result<Self> {
        let path = dir.join(format!("{}.log", stage));
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line. Sink failures are not allowed to abort
    /// a stage, so write errors are dropped here.
    pub fn line(&self, message: &str) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "[{}] {}", stamp, message);
    }

    pub fn close(self) -> Result<()> {
        let mut writer = self.writer.into_inner();
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_lines_are_timestamped() {
        let dir = tempfile::tempdir().unwrap();
        let log = StageLog::open(dir.path(), "selection").unwrap();
        log.line("stage started");
        log.line("stage finished");
        let path = log.path().to_path_buf();
        log.close().unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("stage started"));
        assert!(lines[1].ends_with("stage finished"));
    }
}
