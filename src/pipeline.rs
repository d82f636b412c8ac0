use crate::{
    config::{Config, IneligiblePolicy},
    error::Result,
    file,
    filter::{Eligibility, SkipReason},
    language::LanguageId,
    oracle::{self, DeadCodeOracle, NoopOracle},
    sanitizer,
    scanner::{ScannedFile, Scanner},
    writer::Writer,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Classification of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOutcome {
    /// Cleaned and written to the output tree.
    Processed,
    /// Mirrored verbatim.
    Copied,
    /// Left out of the output.
    Skipped,
    /// Failed; the rest of the batch continued.
    Errored,
}

/// Outcome of one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// Path relative to the scan root, `/`-separated
    pub path: String,

    /// Language detected from the extension
    pub language: LanguageId,

    /// What happened to the file
    pub outcome: FileOutcome,

    /// Skip reason or error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregate result of one cleaning pass.
///
/// Every examined file is counted exactly once, so
/// `total == processed + copied + skipped + errored`.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    /// Archive job identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,

    /// Files examined
    pub total: usize,

    /// Files cleaned
    pub processed: usize,

    /// Files mirrored verbatim
    pub copied: usize,

    /// Files left out
    pub skipped: usize,

    /// Files that failed
    pub errored: usize,

    /// Per-file outcomes in walk order
    pub files: Vec<FileReport>,

    /// Output directory path
    pub output_directory: String,

    /// Produced archive, for archive jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,

    /// Completion timestamp
    pub finished_at: String,

    /// Total execution time in seconds
    pub duration_secs: f64,
}

impl JobResult {
    fn new(output_directory: String) -> Self {
        Self {
            job_id: None,
            total: 0,
            processed: 0,
            copied: 0,
            skipped: 0,
            errored: 0,
            files: Vec::new(),
            output_directory,
            artifact: None,
            finished_at: String::new(),
            duration_secs: 0.0,
        }
    }

    fn record(&mut self, report: FileReport) {
        self.total += 1;
        match report.outcome {
            FileOutcome::Processed => self.processed += 1,
            FileOutcome::Copied => self.copied += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Errored => self.errored += 1,
        }
        self.files.push(report);
    }

    fn finish(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
        self.finished_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    }

    /// Returns true if the counters add up to the total.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total == self.processed + self.copied + self.skipped + self.errored
            && self.total == self.files.len()
    }

    /// Reports with the given outcome, in walk order.
    pub fn with_outcome(&self, outcome: FileOutcome) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(move |f| f.outcome == outcome)
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Code Cleaning Summary                    ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Files Examined:       {:>8}                        ║", self.total);
        println!("║   - Processed:        {:>8}                        ║", self.processed);
        println!("║   - Copied:           {:>8}                        ║", self.copied);
        println!("║   - Skipped:          {:>8}                        ║", self.skipped);
        println!("║   - Errored:          {:>8}                        ║", self.errored);
        println!("║                                                       ║");
        println!("║ Output Directory:                                     ║");
        println!("║   {}", self.output_directory);
        println!("║                                                       ║");
        println!(
            "║ Total Time:           {:>8.2}s                     ║",
            self.duration_secs
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Walks a directory tree and cleans every eligible file into the output.
pub struct Pipeline {
    config: Config,
    writer: Writer,
    oracle: Box<dyn DeadCodeOracle>,
}

impl Pipeline {
    /// Creates a pipeline that only strips comments and log statements.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_oracle(config, Box::new(NoopOracle))
    }

    /// Creates a pipeline that also consults `oracle` for every cleaned file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_oracle(config: Config, oracle: Box<dyn DeadCodeOracle>) -> Result<Self> {
        config.validate()?;

        let writer = Writer::new(config.output_dir.clone(), config.dry_run);

        Ok(Self {
            config,
            writer,
            oracle,
        })
    }

    /// Executes the walk and returns the aggregated result.
    ///
    /// Per-file failures are recorded as [`FileOutcome::Errored`] and never
    /// stop the walk.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output directory cannot be created or
    /// the root cannot be read.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use code_cleaner::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .build()?;
    ///
    /// let result = Pipeline::new(config)?.run()?;
    /// result.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(self) -> Result<JobResult> {
        let start_time = Instant::now();

        info!("Starting cleaning pass");
        if self.config.dry_run {
            warn!("Dry run mode enabled - skipping file writes");
        }

        self.writer.prepare()?;

        let scanner = Scanner::new(&self.config);
        let eligibility = Eligibility::new(&self.config);

        let files = scanner.scan()?;
        info!("Found {} files under {}", files.len(), scanner.root_dir().display());

        let mut result = JobResult::new(scanner.output_dir().display().to_string());
        for file in &files {
            result.record(self.process(file, &eligibility));
        }

        result.finish(start_time.elapsed());

        info!(
            "✓ Cleaning completed in {:.2}s: {} processed, {} copied, {} skipped, {} errored",
            result.duration_secs,
            result.processed,
            result.copied,
            result.skipped,
            result.errored
        );

        Ok(result)
    }

    fn process(&self, file: &ScannedFile, eligibility: &Eligibility) -> FileReport {
        let path = file.display_path();

        match eligibility.check(file) {
            Ok(language) => {
                info!("Processing: {}", path);
                match self.clean(file, language) {
                    Ok(()) => report(path, language, FileOutcome::Processed, None),
                    Err(e) => {
                        warn!("Error processing file {}: {}", path, e);
                        if self.config.ineligible == IneligiblePolicy::Copy {
                            if let Err(copy_err) =
                                self.writer.copy_verbatim(&file.absolute_path, &file.relative_path)
                            {
                                warn!("Could not mirror {}: {}", path, copy_err);
                            }
                        }
                        report(path, language, FileOutcome::Errored, Some(e.to_string()))
                    }
                }
            }
            Err(reason) => self.pass_through(file, path, &reason),
        }
    }

    fn clean(&self, file: &ScannedFile, language: LanguageId) -> Result<()> {
        let source = file::read_source(&file.absolute_path)?;
        let sanitized = sanitizer::sanitize(&source, language);
        let refined = oracle::refine(self.oracle.as_ref(), &sanitized, language);

        self.writer
            .write_text(&file.absolute_path, &file.relative_path, &refined)?;
        debug!(
            "Cleaned {} ({} -> {} bytes)",
            file.display_path(),
            source.len(),
            refined.len()
        );
        Ok(())
    }

    fn pass_through(&self, file: &ScannedFile, path: String, reason: &SkipReason) -> FileReport {
        let language = LanguageId::detect(&file.relative_path);

        match self.config.ineligible {
            IneligiblePolicy::Skip => {
                debug!("Skipping {}: {}", path, reason);
                report(path, language, FileOutcome::Skipped, Some(reason.to_string()))
            }
            IneligiblePolicy::Copy => {
                match self
                    .writer
                    .copy_verbatim(&file.absolute_path, &file.relative_path)
                {
                    Ok(_) => {
                        debug!("Copied {}: {}", path, reason);
                        report(path, language, FileOutcome::Copied, Some(reason.to_string()))
                    }
                    Err(e) => {
                        warn!("Error copying file {}: {}", path, e);
                        report(path, language, FileOutcome::Errored, Some(e.to_string()))
                    }
                }
            }
        }
    }
}

fn report(
    path: String,
    language: LanguageId,
    outcome: FileOutcome,
    detail: Option<String>,
) -> FileReport {
    FileReport {
        path,
        language,
        outcome,
        detail,
    }
}
