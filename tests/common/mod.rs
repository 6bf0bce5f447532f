/// Common test utilities for Crisel tests
///
/// Builds the on-disk directory layout the pipeline expects (reference,
/// strain, off-target and output directories) inside one tempdir.
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A guide window satisfying the construction rules: TTTV PAM, target GC
/// count 9, no homopolymer run in the target.
pub const GUIDE: &str = "TTTAGCGCGCGCGATATATATATA";

pub struct TestLayout {
    // Held for its Drop: removes the whole tree when the test ends
    _temp: TempDir,
    pub reference: PathBuf,
    pub common: PathBuf,
    pub offtarget: PathBuf,
    pub output: PathBuf,
}

impl TestLayout {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = temp.path();
        let layout = Self {
            reference: root.join("reference"),
            common: root.join("common"),
            offtarget: root.join("offtarget"),
            output: root.join("output"),
            _temp: temp,
        };
        for dir in [&layout.reference, &layout.common, &layout.offtarget] {
            std::fs::create_dir_all(dir).expect("failed to create input dir");
        }
        layout
    }
}

/// Write a single-record FASTA file and return its path.
pub fn write_fasta(dir: &Path, name: &str, header: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!(">{}\n{}\n", header, body)).expect("failed to write fasta");
    path
}

/// A genome body that embeds `window` in a cytosine background, which never
/// introduces an extra TTTV PAM on either strand.
pub fn embed(window: &str) -> String {
    format!("{}{}{}", "C".repeat(30), window, "C".repeat(30))
}
