use crate::{
    config::{Config, IneligiblePolicy},
    error::{Error, Result},
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// A regular file found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScannedFile {
    /// Absolute path to the file
    pub(crate) absolute_path: PathBuf,

    /// Path relative to the scan root
    pub(crate) relative_path: PathBuf,
}

impl ScannedFile {
    /// Relative path with `/` separators, as shown in reports.
    pub(crate) fn display_path(&self) -> String {
        slash_path(&self.relative_path)
    }
}

/// Walks the root directory in a deterministic order.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    output_dir: PathBuf,
    recursive: bool,
    pruned_patterns: Vec<String>,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    ///
    /// In skip mode, directories matching an exclusion substring are not
    /// descended into at all. In copy mode they are walked so their files can
    /// be mirrored.
    pub(crate) fn new(config: &Config) -> Self {
        let pruned_patterns = match config.ineligible {
            IneligiblePolicy::Skip => config.exclude_patterns.clone(),
            IneligiblePolicy::Copy => Vec::new(),
        };

        Self {
            root_dir: normalize(&config.root_dir),
            output_dir: normalize(&config.output_dir),
            recursive: config.recursive,
            pruned_patterns,
        }
    }

    /// Normalized root directory.
    pub(crate) fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Normalized output directory.
    pub(crate) fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Lists every regular file under the root, sorted by path.
    ///
    /// The output directory is never listed. Unreadable subdirectories are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root itself cannot be read.
    pub(crate) fn scan(&self) -> Result<Vec<ScannedFile>> {
        debug!("Starting scan of {}", self.root_dir.display());

        let mut walker = WalkDir::new(&self.root_dir)
            .follow_links(false)
            .sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        let mut walk_errors = 0usize;

        for result in walker.into_iter().filter_entry(|entry| !self.is_pruned(entry)) {
            match result {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.into_path();
                    let relative_path = pathdiff::diff_paths(&path, &self.root_dir)
                        .unwrap_or_else(|| path.clone());

                    trace!("Found file: {}", relative_path.display());
                    files.push(ScannedFile {
                        absolute_path: path,
                        relative_path,
                    });
                }
                Ok(_) => {}
                Err(e) if e.depth() == 0 => {
                    return Err(Error::io(&self.root_dir, e.into()));
                }
                Err(e) => {
                    warn!("Walk error: {}", e);
                    walk_errors += 1;
                }
            }
        }

        debug!(
            "Scan complete: {} files, {} walk errors",
            files.len(),
            walk_errors
        );

        Ok(files)
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }

        if entry.path().starts_with(&self.output_dir) {
            debug!("Skipping output directory: {}", entry.path().display());
            return true;
        }

        let relative = entry
            .path()
            .strip_prefix(&self.root_dir)
            .map_or_else(|_| slash_path(entry.path()), slash_path);

        let pruned = self
            .pruned_patterns
            .iter()
            .any(|pattern| relative.contains(pattern.as_str()));
        if pruned {
            debug!("Skipping excluded directory: {}", relative);
        }
        pruned
    }
}

/// Canonical form of `path`, or its lexical absolute form if it does not exist.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Joins the components of `path` with `/`.
pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn config(root: &Path, policy: IneligiblePolicy) -> Config {
        Config::builder()
            .root_dir(root)
            .ineligible(policy)
            .build()
            .unwrap()
    }

    fn listed(files: &[ScannedFile]) -> Vec<String> {
        files.iter().map(ScannedFile::display_path).collect()
    }

    #[test]
    fn test_scanner_nested_directories_sorted() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child("src/lib.rs").write_str("pub fn a() {}").unwrap();
        temp.child("b.py").write_str("x = 1").unwrap();

        let scanner = Scanner::new(&config(temp.path(), IneligiblePolicy::Skip));
        let files = scanner.scan().unwrap();

        assert_eq!(listed(&files), vec!["b.py", "src/lib.rs", "src/main.rs"]);
        assert!(files.iter().all(|f| f.absolute_path.is_absolute()));
    }

    #[test]
    fn test_scanner_top_level_only() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("top.py").write_str("x = 1").unwrap();
        temp.child("nested/deep.py").write_str("y = 2").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .recursive(false)
            .build()
            .unwrap();
        let files = Scanner::new(&config).scan().unwrap();

        assert_eq!(listed(&files), vec!["top.py"]);
    }

    #[test]
    fn test_scanner_never_lists_output_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("x = 1").unwrap();
        temp.child("copy/a.py").write_str("x = 1").unwrap();

        let scanner = Scanner::new(&config(temp.path(), IneligiblePolicy::Skip));
        let files = scanner.scan().unwrap();

        assert_eq!(listed(&files), vec!["a.py"]);
    }

    #[test]
    fn test_skip_mode_prunes_excluded_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("index.js").write_str("let a;").unwrap();
        temp.child("node_modules/dep/index.js").write_str("let b;").unwrap();

        let files = Scanner::new(&config(temp.path(), IneligiblePolicy::Skip))
            .scan()
            .unwrap();

        assert_eq!(listed(&files), vec!["index.js"]);
    }

    #[test]
    fn test_copy_mode_walks_excluded_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("index.js").write_str("let a;").unwrap();
        temp.child("node_modules/dep/index.js").write_str("let b;").unwrap();

        let files = Scanner::new(&config(temp.path(), IneligiblePolicy::Copy))
            .scan()
            .unwrap();

        assert_eq!(listed(&files), vec!["index.js", "node_modules/dep/index.js"]);
    }

    #[test]
    fn test_scanner_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();

        let files = Scanner::new(&config(temp.path(), IneligiblePolicy::Skip))
            .scan()
            .unwrap();

        assert!(files.is_empty());
    }
}
