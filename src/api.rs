//! # Quick start API
//!
//! Fluent front for the common cases. Start here if you want results without
//! assembling a [`Config`] by hand.
//!
//! ## Examples
//!
//! ```no_run
//! use code_cleaner::api::Clean;
//!
//! // Clean the current directory into ./copy
//! Clean::current_dir().run()?;
//!
//! // Clean a project, top level only, into a chosen directory
//! Clean::dir("./project")
//!     .output("./clean")
//!     .exclude(["node_modules", "target"])
//!     .no_subdirs()
//!     .run()?;
//! # Ok::<(), code_cleaner::Error>(())
//! ```

use crate::{
    Config, DeadCodeOracle, IneligiblePolicy, JobResult, NoopOracle, Pipeline, Result,
};
use std::path::PathBuf;

/// Builder for one cleaning pass.
#[derive(Debug, Clone)]
#[must_use = "call .run() to execute the cleaning pass"]
pub struct Clean {
    dir: PathBuf,
    output: Option<PathBuf>,
    excludes: Option<Vec<String>>,
    recursive: bool,
    ineligible: IneligiblePolicy,
    dry_run: bool,
}

impl Default for Clean {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            output: None,
            excludes: None,
            recursive: true,
            ineligible: IneligiblePolicy::Skip,
            dry_run: false,
        }
    }
}

impl Clean {
    /// Clean the current directory.
    pub fn current_dir() -> Self {
        Self::default()
    }

    /// Clean the given directory.
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            dir: path.into(),
            ..Self::default()
        }
    }

    /// Output directory; relative paths resolve against the cleaned directory.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Replace the default exclusion substrings.
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Only clean files directly inside the directory.
    pub fn no_subdirs(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Mirror files that are not cleaned instead of leaving them out.
    pub fn copy_ineligible(mut self) -> Self {
        self.ineligible = IneligiblePolicy::Copy;
        self
    }

    /// Classify and count without writing anything.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Run the cleaning pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the directory
    /// cannot be read.
    pub fn run(self) -> Result<JobResult> {
        self.run_with_oracle(Box::new(NoopOracle))
    }

    /// Run the cleaning pass, consulting `oracle` for every cleaned file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the directory
    /// cannot be read.
    pub fn run_with_oracle(self, oracle: Box<dyn DeadCodeOracle>) -> Result<JobResult> {
        Pipeline::with_oracle(self.into_config()?, oracle)?.run()
    }

    fn into_config(self) -> Result<Config> {
        let mut builder = Config::builder()
            .root_dir(self.dir)
            .recursive(self.recursive)
            .ineligible(self.ineligible)
            .dry_run(self.dry_run);

        if let Some(output) = self.output {
            builder = builder.output_dir(output);
        }
        if let Some(excludes) = self.excludes {
            builder = builder.exclude_patterns(excludes);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileOutcome;
    use assert_fs::prelude::*;

    #[test]
    fn test_clean_defaults_to_copy_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.go").write_str("// c\nfunc main() {}\n").unwrap();

        let result = Clean::dir(temp.path()).run().unwrap();

        assert_eq!(result.processed, 1);
        temp.child("copy/main.go").assert("\nfunc main() {}\n");
    }

    #[test]
    fn test_no_subdirs_and_custom_excludes() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("keep.py").write_str("x = 1").unwrap();
        temp.child("gen_skip.py").write_str("y = 2").unwrap();
        temp.child("nested/deep.py").write_str("z = 3").unwrap();

        let result = Clean::dir(temp.path())
            .output("clean")
            .exclude(["gen_"])
            .no_subdirs()
            .run()
            .unwrap();

        assert_eq!(result.total, 2);
        assert_eq!(result.processed, 1);
        assert_eq!(result.skipped, 1);
        assert!(temp.child("clean/keep.py").exists());
        assert!(!temp.child("clean/nested").exists());
    }

    #[test]
    fn test_copy_ineligible_mirrors_unknown_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("notes.md").write_str("# notes").unwrap();

        let result = Clean::dir(temp.path()).copy_ineligible().run().unwrap();

        assert_eq!(result.files[0].outcome, FileOutcome::Copied);
        temp.child("copy/notes.md").assert("# notes");
    }

    #[test]
    fn test_dry_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.rb").write_str("puts 1\n").unwrap();

        let result = Clean::dir(temp.path()).dry_run().run().unwrap();

        assert_eq!(result.processed, 1);
        assert!(!temp.child("copy").exists());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(Clean::dir("/definitely/not/here").run().unwrap_err().is_config());
    }
}
