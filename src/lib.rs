pub mod bio;
pub mod cli;
pub mod config;
pub mod eval;
pub mod genome;
pub mod pipeline;
pub mod report;

pub use crate::bio::sequence::{Sequence, Strand};
pub use crate::genome::Genome;
pub use crate::pipeline::Pipeline;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CriselError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Genome error: {0}")]
    Genome(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, CriselError>;
