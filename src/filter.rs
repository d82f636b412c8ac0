//! Per-file eligibility policy.
//!
//! Decides whether a scanned file is cleaned or passed through. Checks run
//! in a fixed order and the first failing check names the reason.

use crate::{
    config::Config,
    file,
    language::LanguageId,
    scanner::{self, ScannedFile},
};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Why a file is not cleaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SkipReason {
    /// A path component starts with `.`.
    Hidden,
    /// The file belongs to the tool itself.
    OwnArtifact,
    /// The file lies inside the output location.
    InsideOutput,
    /// The relative path contains an exclusion substring.
    Excluded(String),
    /// Binary or undecodable content.
    NotText,
    /// No rules exist for the file's extension.
    UnknownLanguage,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden => f.write_str("hidden"),
            Self::OwnArtifact => f.write_str("own artifact"),
            Self::InsideOutput => f.write_str("inside output directory"),
            Self::Excluded(pattern) => write!(f, "excluded by '{pattern}'"),
            Self::NotText => f.write_str("not a text file"),
            Self::UnknownLanguage => f.write_str("unknown language"),
        }
    }
}

/// Eligibility checks bound to one configuration.
#[derive(Debug, Clone)]
pub(crate) struct Eligibility {
    output_dir: PathBuf,
    exclude_patterns: Vec<String>,
    self_artifacts: Vec<PathBuf>,
}

impl Eligibility {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            output_dir: scanner::normalize(&config.output_dir),
            exclude_patterns: config.exclude_patterns.clone(),
            self_artifacts: config
                .self_artifacts
                .iter()
                .map(|p| scanner::normalize(p))
                .collect(),
        }
    }

    /// Returns the file's language if it should be cleaned.
    pub(crate) fn check(&self, file: &ScannedFile) -> Result<LanguageId, SkipReason> {
        if is_hidden(&file.relative_path) {
            return Err(SkipReason::Hidden);
        }

        if self.self_artifacts.iter().any(|a| *a == file.absolute_path) {
            return Err(SkipReason::OwnArtifact);
        }

        if file.absolute_path.starts_with(&self.output_dir) {
            return Err(SkipReason::InsideOutput);
        }

        let relative = file.display_path();
        if let Some(pattern) = self
            .exclude_patterns
            .iter()
            .find(|p| relative.contains(p.as_str()))
        {
            return Err(SkipReason::Excluded(pattern.clone()));
        }

        if !file::probe_text(&file.absolute_path) {
            return Err(SkipReason::NotText);
        }

        match LanguageId::detect(&file.relative_path) {
            LanguageId::Unknown => Err(SkipReason::UnknownLanguage),
            language => Ok(language),
        }
    }
}

fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}
