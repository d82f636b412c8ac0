//! # code-cleaner
//!
//! Strips comments and logging statements from source trees.
//!
//! ## Features
//!
//! - Per-language removal rules for 17 languages, with a generic fallback
//! - Directory mode: clean a tree into a mirrored output directory
//! - Archive mode: extract a zip, clean it, re-archive the result
//! - Optional dead-code oracle backed by an Ollama server
//! - Atomic output writes and per-file error isolation
//!
//! ## Quick Start
//!
//! ```no_run
//! use code_cleaner::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./project")
//!     .output_dir("./clean")
//!     .build()?;
//!
//! let result = Pipeline::new(config)?.run()?;
//! println!("{} of {} files cleaned", result.processed, result.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Scanner**: walks the root in sorted order
//! 2. **Eligibility**: decides which files are cleaned
//! 3. **Sanitizer**: applies the language's comment rules, then its log rules
//! 4. **Writer**: mirrors results under the output directory
//!
//! Archive jobs wrap the same pipeline with extraction and compression.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod file;
mod filter;
mod language;
mod pipeline;
mod sanitizer;
mod scanner;
mod writer;

pub mod api;
pub mod archive;
pub mod job;
pub mod oracle;
pub mod patterns;
#[cfg(feature = "server")]
pub mod server;

pub use config::{
    Config, ConfigBuilder, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_OUTPUT_DIR, IneligiblePolicy,
    default_exclude_patterns,
};
pub use error::{Error, Result};
pub use job::{ArchiveJob, JobSettings, JobState};
pub use language::{LanguageId, detect};
pub use oracle::{DeadCodeOracle, NoopOracle, OllamaOracle, OracleSettings};
pub use patterns::{PatternSet, Rule, lookup};
pub use pipeline::{FileOutcome, FileReport, JobResult, Pipeline};
pub use sanitizer::sanitize;

/// Runs one cleaning pass with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Root directory doesn't exist or is inaccessible
/// - Output directory cannot be created
///
/// Failures on individual files are reported in the result instead.
///
/// # Examples
///
/// ```no_run
/// use code_cleaner::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .build()?;
///
/// let result = run(config)?;
/// assert_eq!(
///     result.total,
///     result.processed + result.copied + result.skipped + result.errored
/// );
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<JobResult> {
    Pipeline::new(config)?.run()
}
