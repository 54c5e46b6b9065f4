// Audio processing pipeline for meeting-insights
// Converts one uploaded recording into committed insights: fetch the
// audio, stage it with the provider, extract structured data, commit.

pub mod fetch;
pub mod queue;
pub mod runner;
pub mod scratch;

pub use queue::{DispatchError, PipelineQueue};

use std::fmt;
use std::path::PathBuf;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timeout applied to the audio download
    pub fetch_timeout_secs: u64,
    /// Directory scratch files are written under
    pub scratch_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 120,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Error types for pipeline stages.
///
/// Every variant is fatal to the pipeline instance that raised it and
/// resolves to a FAILED meeting; cleanup problems are logged warnings,
/// not errors, and never appear here.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Audio retrieval failed (network error or non-success status)
    Fetch(String),
    /// Scratch write or provider file staging failed
    Staging(String),
    /// Model call failed, or returned output that does not decode
    Generation(String),
    /// The commit transaction failed
    Persistence(String),
}

impl PipelineError {
    /// Stage label used in failure logs
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Staging(_) => "staging",
            PipelineError::Generation(_) => "generation",
            PipelineError::Persistence(_) => "persistence",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Fetch(msg) => write!(f, "Audio fetch failed: {}", msg),
            PipelineError::Staging(msg) => write!(f, "File staging failed: {}", msg),
            PipelineError::Generation(msg) => write!(f, "Insight generation failed: {}", msg),
            PipelineError::Persistence(msg) => write!(f, "Commit failed: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
