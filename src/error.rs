//! Crate-level error type.
//!
//! Per-node mutation failures during a refresh pass are intentionally NOT
//! represented here: they are skipped and counted in `RefreshStats`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkcoreError {
    #[error("pattern compile failed: {0}")]
    PatternCompile(#[from] regex::Error),

    #[error("automaton build failed: {0}")]
    AutomatonBuild(#[from] aho_corasick::BuildError),

    #[error("config parse failed: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MarkcoreError>;
