use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Default output directory name, resolved against the root directory.
pub const DEFAULT_OUTPUT_DIR: &str = "copy";

/// Path substrings excluded from processing unless overridden.
pub const DEFAULT_EXCLUDE_PATTERNS: [&str; 4] = ["node_modules", ".git", "__pycache__", ".DS_Store"];

/// What happens to a file that is not eligible for cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IneligiblePolicy {
    /// Mirror the file verbatim into the output (archive and web mode).
    Copy,
    /// Produce no output for the file (CLI mode).
    #[default]
    Skip,
}

/// Configuration for one cleaning pass over a directory tree.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to scan for files
    pub root_dir: PathBuf,

    /// Directory receiving the cleaned tree
    pub output_dir: PathBuf,

    /// Descend into subdirectories
    pub recursive: bool,

    /// Any path containing one of these substrings is not cleaned
    pub exclude_patterns: Vec<String>,

    /// Treatment of files that are not cleaned
    pub ineligible: IneligiblePolicy,

    /// Files belonging to the tool itself
    pub self_artifacts: Vec<PathBuf>,

    /// Dry run mode (no file writes)
    pub dry_run: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use code_cleaner::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .output_dir("./clean")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - Output directory is the root directory itself
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if same_location(&self.root_dir, &self.output_dir) {
            return Err(Error::config(format!(
                "Output directory must differ from the root directory: {}",
                self.output_dir.display()
            )));
        }

        if self.exclude_patterns.iter().any(String::is_empty) {
            return Err(Error::config("Exclude patterns must not be empty"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output_dir: PathBuf::from(".").join(DEFAULT_OUTPUT_DIR),
            recursive: true,
            exclude_patterns: default_exclude_patterns(),
            ineligible: IneligiblePolicy::Skip,
            self_artifacts: current_executable(),
            dry_run: false,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    recursive: Option<bool>,
    exclude_patterns: Option<Vec<String>>,
    ineligible: Option<IneligiblePolicy>,
    self_artifacts: Vec<PathBuf>,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Sets the root directory to scan.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the output directory.
    ///
    /// A relative path is resolved against the root directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Enables or disables descending into subdirectories.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = Some(enabled);
        self
    }

    /// Replaces the exclusion substrings. Blank entries are dropped.
    #[must_use]
    pub fn exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = Some(
            patterns
                .into_iter()
                .map(|p| {
                    let p: String = p.into();
                    p.trim().to_string()
                })
                .filter(|p| !p.is_empty())
                .collect(),
        );
        self
    }

    /// Sets the treatment of files that are not cleaned.
    #[must_use]
    pub fn ineligible(mut self, policy: IneligiblePolicy) -> Self {
        self.ineligible = Some(policy);
        self
    }

    /// Adds a file that belongs to the tool and must never be cleaned.
    #[must_use]
    pub fn self_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.self_artifacts.push(path.into());
        self
    }

    /// Enables dry run mode (no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let root_dir = self.root_dir.unwrap_or_else(|| PathBuf::from("."));
        let output_dir = resolve_output(
            &root_dir,
            self.output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        );

        let mut self_artifacts = current_executable();
        self_artifacts.extend(self.self_artifacts);

        let config = Config {
            root_dir,
            output_dir,
            recursive: self.recursive.unwrap_or(true),
            exclude_patterns: self
                .exclude_patterns
                .unwrap_or_else(default_exclude_patterns),
            ineligible: self.ineligible.unwrap_or_default(),
            self_artifacts,
            dry_run: self.dry_run,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Returns [`DEFAULT_EXCLUDE_PATTERNS`] as owned strings.
#[must_use]
pub fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn resolve_output(root: &Path, output: PathBuf) -> PathBuf {
    if output.is_absolute() {
        output
    } else {
        root.join(output)
    }
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn current_executable() -> Vec<PathBuf> {
    std::env::current_exe().into_iter().collect()
}
