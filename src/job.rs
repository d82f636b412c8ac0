//! Archive jobs: extract, clean, re-archive.
//!
//! Each job owns a scratch workspace named after its identifier. The
//! workspace is removed when the job ends, whatever the outcome; only the
//! produced artifact outlives the job.

use crate::{
    archive,
    config::{self, Config, IneligiblePolicy},
    error::{Error, Result},
    oracle::{DeadCodeOracle, NoopOracle, OllamaOracle, OracleSettings},
    pipeline::{JobResult, Pipeline},
};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const ARTIFACT_SUFFIX: &str = "_processed.zip";

/// Lifecycle of an archive job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Workspace allocated.
    Created,
    /// Unpacking the upload.
    Extracting,
    /// Cleaning the extracted tree.
    Processing,
    /// Packing the cleaned tree.
    Archiving,
    /// Artifact written.
    Done,
    /// Stopped by a fatal error.
    Failed,
}

impl JobState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Extracting => "extracting",
            Self::Processing => "processing",
            Self::Archiving => "archiving",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Settings shared by every archive job.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Parent of per-job scratch workspaces
    pub work_root: PathBuf,

    /// Where artifacts are written
    pub processed_dir: PathBuf,

    /// Exclusion substrings
    pub exclude_patterns: Vec<String>,

    /// Ollama oracle, if one is configured
    pub oracle: Option<OracleSettings>,
}

impl JobSettings {
    /// Settings writing artifacts to `processed_dir`, with scratch space in
    /// the OS temp directory.
    #[must_use]
    pub fn new(processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_root: std::env::temp_dir(),
            processed_dir: processed_dir.into(),
            exclude_patterns: config::default_exclude_patterns(),
            oracle: None,
        }
    }
}

/// One extract → clean → re-archive run.
pub struct ArchiveJob {
    id: Uuid,
    state: JobState,
    workspace: Option<TempDir>,
    processed_dir: PathBuf,
    exclude_patterns: Vec<String>,
    oracle: Box<dyn DeadCodeOracle>,
}

impl ArchiveJob {
    /// Allocates a job with a fresh identifier and workspace.
    ///
    /// The oracle client, if configured, is blocking: create and run jobs on
    /// a thread that may block.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be created or the oracle
    /// client cannot be built.
    pub fn new(settings: &JobSettings) -> Result<Self> {
        let id = Uuid::new_v4();

        fs::create_dir_all(&settings.work_root).map_err(|e| Error::io(&settings.work_root, e))?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("{id}-"))
            .tempdir_in(&settings.work_root)
            .map_err(|e| Error::io(&settings.work_root, e))?;

        let oracle: Box<dyn DeadCodeOracle> = match &settings.oracle {
            Some(oracle_settings) => Box::new(OllamaOracle::new(oracle_settings)?),
            None => Box::new(NoopOracle),
        };

        debug!("Job {} workspace: {}", id, workspace.path().display());

        Ok(Self {
            id,
            state: JobState::Created,
            workspace: Some(workspace),
            processed_dir: settings.processed_dir.clone(),
            exclude_patterns: settings.exclude_patterns.clone(),
            oracle,
        })
    }

    /// Replaces the oracle consulted for cleaned files.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Box<dyn DeadCodeOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Job identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Where this job's artifact is (or will be) written.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        artifact_path(&self.processed_dir, self.id)
    }

    /// Scratch workspace, until the job has run.
    #[must_use]
    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_ref().map(TempDir::path)
    }

    /// Runs the job against the uploaded `archive`.
    ///
    /// On failure any partially written artifact is removed. The workspace
    /// is removed in every case.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be extracted, processed or
    /// re-archived, or if the job has already run.
    #[instrument(skip(self, archive), fields(job_id = %self.id))]
    pub fn run(&mut self, archive: &Path) -> Result<JobResult> {
        if self.state.is_terminal() {
            return Err(Error::config(format!(
                "Job {} has already run ({})",
                self.id, self.state
            )));
        }

        let artifact = self.artifact_path();
        let outcome = self.execute(archive, &artifact);

        if let Err(e) = &outcome {
            self.state = JobState::Failed;
            warn!("Job {} failed: {}", self.id, e);

            if artifact.exists() {
                if let Err(remove_err) = fs::remove_file(&artifact) {
                    warn!("Could not remove partial artifact {}: {}", artifact.display(), remove_err);
                }
            }
        }

        if let Some(workspace) = self.workspace.take() {
            let path = workspace.path().to_path_buf();
            if let Err(e) = workspace.close() {
                warn!("Could not remove workspace {}: {}", path.display(), e);
            }
        }

        outcome
    }

    fn execute(&mut self, archive: &Path, artifact: &Path) -> Result<JobResult> {
        let workspace = self
            .workspace
            .as_ref()
            .map(|w| w.path().to_path_buf())
            .ok_or_else(|| Error::config(format!("Job {} has no workspace", self.id)))?;
        let extracted = workspace.join("extracted");
        let output = workspace.join("output");

        self.transition(JobState::Extracting);
        let count = archive::extract(archive, &extracted)?;
        info!("Extracted {} files", count);

        self.transition(JobState::Processing);
        let config = Config::builder()
            .root_dir(&extracted)
            .output_dir(&output)
            .exclude_patterns(self.exclude_patterns.clone())
            .ineligible(IneligiblePolicy::Copy)
            .build()?;
        let oracle = std::mem::replace(&mut self.oracle, Box::new(NoopOracle));
        let mut result = Pipeline::with_oracle(config, oracle)?.run()?;

        self.transition(JobState::Archiving);
        archive::compress_dir(&output, artifact)?;

        result.job_id = Some(self.id);
        result.artifact = Some(artifact.to_path_buf());
        self.transition(JobState::Done);

        Ok(result)
    }

    fn transition(&mut self, next: JobState) {
        debug!("Job {}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }
}

/// Artifact location for `job_id` under `processed_dir`.
#[must_use]
pub fn artifact_path(processed_dir: &Path, job_id: Uuid) -> PathBuf {
    processed_dir.join(format!("{job_id}{ARTIFACT_SUFFIX}"))
}

/// Deletes the artifact of `job_id`. Returns false if there was none.
///
/// # Errors
///
/// Returns an error if the artifact exists but cannot be removed.
pub fn remove_artifact(processed_dir: &Path, job_id: Uuid) -> Result<bool> {
    let path = artifact_path(processed_dir, job_id);
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!("Removed artifact: {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(&path, e)),
    }
}

/// Removes artifacts older than `max_age`. Returns how many were removed.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a stale artifact
/// cannot be removed.
pub fn purge_stale_artifacts(processed_dir: &Path, max_age: Duration) -> Result<usize> {
    if !processed_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let now = SystemTime::now();

    for entry in fs::read_dir(processed_dir).map_err(|e| Error::io(processed_dir, e))? {
        let entry = entry.map_err(|e| Error::io(processed_dir, e))?;
        let path = entry.path();

        let is_artifact = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(ARTIFACT_SUFFIX));
        if !is_artifact {
            continue;
        }

        let metadata = fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
        let stale = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > max_age);

        if stale {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            removed += 1;
            debug!("Removed stale artifact: {}", path.display());
        }
    }

    if removed > 0 {
        info!("Cleaned up {} stale artifacts", removed);
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageId;
    use crate::pipeline::FileOutcome;
    use assert_fs::prelude::*;
    use std::collections::BTreeSet;
    use std::fs::File;
    use std::io::{Read, Write};
    use zip::write::SimpleFileOptions;
    use zip::{ZipArchive, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut bytes = Vec::new();
        zip.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn settings(temp: &assert_fs::TempDir) -> JobSettings {
        JobSettings {
            work_root: temp.path().join("work"),
            ..JobSettings::new(temp.path().join("processed"))
        }
    }

    fn is_empty_dir(path: &Path) -> bool {
        fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn test_job_cleans_and_rearchives() {
        let temp = assert_fs::TempDir::new().unwrap();
        let upload = temp.path().join("upload.zip");
        write_zip(
            &upload,
            &[
                ("app.js", b"console.log('hi');\nconst a = 1;\n"),
                ("readme.md", b"# Notes // not code\n"),
            ],
        );

        let mut job = ArchiveJob::new(&settings(&temp)).unwrap();
        assert_eq!(job.state(), JobState::Created);
        let result = job.run(&upload).unwrap();

        assert_eq!(job.state(), JobState::Done);
        assert_eq!(result.job_id, Some(job.id()));
        assert_eq!(result.total, 2);
        assert_eq!(result.processed, 1);
        assert_eq!(result.copied, 1);
        assert!(result.is_consistent());

        let artifact = job.artifact_path();
        assert_eq!(result.artifact.as_deref(), Some(artifact.as_path()));
        assert_eq!(read_entry(&artifact, "app.js"), b";\nconst a = 1;\n");
        assert_eq!(read_entry(&artifact, "readme.md"), b"# Notes // not code\n");

        assert!(job.workspace().is_none());
        assert!(is_empty_dir(&temp.path().join("work")));
    }

    #[test]
    fn test_job_mirrors_excluded_and_hidden_paths() {
        let temp = assert_fs::TempDir::new().unwrap();
        let upload = temp.path().join("upload.zip");
        write_zip(
            &upload,
            &[
                (".git/config", b"[core]\n"),
                ("node_modules/x/index.js", b"// vendored\n"),
                ("src/main.py", b"print(1)\nx = 2\n"),
            ],
        );

        let mut job = ArchiveJob::new(&settings(&temp)).unwrap();
        let result = job.run(&upload).unwrap();

        assert_eq!(result.total, 3);
        assert_eq!(result.copied, 2);
        let report = result
            .files
            .iter()
            .find(|f| f.path == "src/main.py")
            .unwrap();
        assert_eq!(report.language, LanguageId::Python);
        assert_eq!(report.outcome, FileOutcome::Processed);

        let artifact = job.artifact_path();
        assert_eq!(read_entry(&artifact, "node_modules/x/index.js"), b"// vendored\n");
        assert_eq!(read_entry(&artifact, "src/main.py"), b"\nx = 2\n");
    }

    fn entry_names(archive: &Path) -> BTreeSet<String> {
        let zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        zip.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_artifact_has_same_paths_and_copies_are_identical() {
        let temp = assert_fs::TempDir::new().unwrap();
        let upload = temp.path().join("upload.zip");
        let entries: &[(&str, &[u8])] = &[
            (".git/config", b"[core]\n\tbare = false\n"),
            ("node_modules/left-pad/index.js", b"// pad\nconsole.log(1);\n"),
            ("assets/logo.png", &[0x89, b'P', b'N', b'G', 0, 0, 0xFF]),
            ("data/blob.py", b"x = 1\0\0\0"),
            ("docs/guide.md", b"# Guide\n// kept\n"),
            ("src/main.py", b"print('x')  # debug\ndef f(): return 1\n"),
            ("src/app.js", b"console.log('hi');\nconst a = 1; // note\n"),
        ];
        write_zip(&upload, entries);

        let mut job = ArchiveJob::new(&settings(&temp)).unwrap();
        let result = job.run(&upload).unwrap();
        let artifact = job.artifact_path();

        assert_eq!(entry_names(&artifact), entry_names(&upload));
        assert_eq!(result.total, entries.len());
        assert_eq!(result.processed, 2);
        assert_eq!(result.copied, 5);
        assert!(result.is_consistent());

        for report in &result.files {
            if report.outcome == FileOutcome::Copied {
                assert_eq!(
                    read_entry(&artifact, &report.path),
                    read_entry(&upload, &report.path),
                    "{} changed",
                    report.path
                );
            }
        }
        assert_eq!(read_entry(&artifact, "src/app.js"), b";\nconst a = 1; \n");
    }

    #[test]
    fn test_corrupt_archive_fails_and_cleans_up() {
        let temp = assert_fs::TempDir::new().unwrap();
        let upload = temp.child("upload.zip");
        upload.write_str("not a zip").unwrap();

        let mut job = ArchiveJob::new(&settings(&temp)).unwrap();
        let err = job.run(upload.path()).unwrap_err();

        assert!(err.is_archive());
        assert_eq!(job.state(), JobState::Failed);
        assert!(!job.artifact_path().exists());
        assert!(is_empty_dir(&temp.path().join("work")));
    }

    #[test]
    fn test_path_traversal_entry_fails_job() {
        let temp = assert_fs::TempDir::new().unwrap();
        let upload = temp.path().join("upload.zip");
        write_zip(&upload, &[("ok.py", b"x = 1"), ("../../evil.py", b"x = 2")]);

        let mut job = ArchiveJob::new(&settings(&temp)).unwrap();

        assert!(job.run(&upload).unwrap_err().is_archive());
        assert_eq!(job.state(), JobState::Failed);
        assert!(!temp.path().join("evil.py").exists());
    }

    #[test]
    fn test_jobs_have_distinct_workspaces() {
        let temp = assert_fs::TempDir::new().unwrap();
        let first = ArchiveJob::new(&settings(&temp)).unwrap();
        let second = ArchiveJob::new(&settings(&temp)).unwrap();

        assert_ne!(first.id(), second.id());
        assert_ne!(first.workspace(), second.workspace());
        assert!(
            first
                .workspace()
                .unwrap()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(&first.id().to_string())
        );
    }

    #[test]
    fn test_job_runs_only_once() {
        let temp = assert_fs::TempDir::new().unwrap();
        let upload = temp.path().join("upload.zip");
        write_zip(&upload, &[("a.py", b"x = 1")]);

        let mut job = ArchiveJob::new(&settings(&temp)).unwrap();
        job.run(&upload).unwrap();

        assert!(job.run(&upload).unwrap_err().is_config());
        assert_eq!(job.state(), JobState::Done);
        assert!(job.artifact_path().exists());
    }

    #[test]
    fn test_remove_artifact() {
        let temp = assert_fs::TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let path = artifact_path(temp.path(), id);
        fs::write(&path, b"zip").unwrap();

        assert!(remove_artifact(temp.path(), id).unwrap());
        assert!(!path.exists());
        assert!(!remove_artifact(temp.path(), id).unwrap());
    }

    #[test]
    fn test_purge_stale_artifacts() {
        use std::thread;

        let temp = assert_fs::TempDir::new().unwrap();

        let old = temp.child(format!("{}{}", Uuid::new_v4(), ARTIFACT_SUFFIX));
        old.write_str("old").unwrap();
        let unrelated = temp.child("notes.txt");
        unrelated.write_str("keep").unwrap();

        thread::sleep(Duration::from_millis(100));

        let fresh = temp.child(format!("{}{}", Uuid::new_v4(), ARTIFACT_SUFFIX));
        fresh.write_str("new").unwrap();

        let removed = purge_stale_artifacts(temp.path(), Duration::from_millis(50)).unwrap();

        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_purge_missing_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let removed = purge_stale_artifacts(&temp.path().join("none"), Duration::ZERO).unwrap();
        assert_eq!(removed, 0);
    }
}
