use crate::eval::RiskThresholds;
use crate::{CriselError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub selection: SelectionConfig,
    pub typing: TypingConfig,
    pub io: IoConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Inclusive target-region GC count bounds.
    pub gc_min: usize,
    pub gc_max: usize,
    /// Homopolymer run length rejected within the target region.
    pub run_length: usize,
    /// Treat multiple reference files as chromosomes of one organism and
    /// window their concatenation instead of unioning per-file windows.
    pub merge_chromosomes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Minimum agreeing target positions for a window to count as a
    /// residual-binding hit.
    pub min_target_matches: usize,
    pub risk: RiskThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    /// Reference genome FASTA files (candidate source).
    pub reference_dir: PathBuf,
    /// Strain genomes the guide must be conserved across.
    pub common_dir: PathBuf,
    /// Genomes the guide must not cross-react with.
    pub offtarget_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Worker threads (0 = all available).
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selection: SelectionConfig {
                gc_min: 9,
                gc_max: 11,
                run_length: 4,
                merge_chromosomes: false,
            },
            typing: TypingConfig {
                min_target_matches: 14,
                risk: RiskThresholds::default(),
            },
            io: IoConfig {
                reference_dir: PathBuf::from("reference"),
                common_dir: PathBuf::from("common"),
                offtarget_dir: PathBuf::from("offtarget"),
                output_dir: PathBuf::from("output"),
            },
            performance: PerformanceConfig { threads: 0 },
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| CriselError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<()> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| CriselError::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}
