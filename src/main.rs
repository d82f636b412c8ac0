use anyhow::Context;
use clap::{Args, Parser};
use code_cleaner::{
    Config, DeadCodeOracle, NoopOracle, OllamaOracle, OracleSettings, Pipeline,
    oracle::DEFAULT_MODEL,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "code-cleaner",
    version,
    author,
    about = "Strip comments and log statements from source code",
    long_about = "Strip comments and log statements from source code.\n\n\
    Every recognised source file under the directory is cleaned into a mirrored \
    output directory. Files that are hidden, excluded, binary or in an unknown \
    language are left out.\n\n\
    USAGE EXAMPLES:\n  \
      # Clean the current directory into ./copy\n  \
      code-cleaner\n\n  \
      # Clean a project, top level only\n  \
      code-cleaner --dir ./my-project --output ./clean --no-subdirs\n\n  \
      # Custom exclusions\n  \
      code-cleaner -e node_modules,target,dist\n\n  \
      # Run the upload service\n  \
      code-cleaner serve --port 8080"
)]
struct Cli {
    #[cfg(feature = "server")]
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory to clean
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    dir: PathBuf,

    /// Output directory, relative to the cleaned directory unless absolute
    #[arg(short, long, default_value = code_cleaner::DEFAULT_OUTPUT_DIR, value_name = "PATH")]
    output: PathBuf,

    /// Only clean files directly inside the directory
    #[arg(short = 'n', long)]
    no_subdirs: bool,

    /// Comma-separated path substrings to exclude
    #[arg(
        short,
        long,
        global = true,
        value_delimiter = ',',
        default_value = "node_modules,.git,__pycache__,.DS_Store"
    )]
    exclude: Vec<String>,

    /// Dry run (don't write files)
    #[arg(long)]
    dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    oracle: OracleArgs,
}

#[derive(Args, Debug)]
struct OracleArgs {
    /// Ollama base URL; enables dead-code removal
    #[arg(long, global = true, env = "CODE_CLEANER_ORACLE_URL", value_name = "URL")]
    oracle_url: Option<String>,

    /// Ollama model name
    #[arg(long, global = true, env = "CODE_CLEANER_ORACLE_MODEL", default_value = DEFAULT_MODEL)]
    oracle_model: String,

    /// Oracle request timeout in seconds
    #[arg(long, global = true, default_value_t = 60, value_name = "SECS")]
    oracle_timeout: u64,
}

impl OracleArgs {
    fn settings(&self) -> Option<OracleSettings> {
        self.oracle_url.as_ref().map(|url| OracleSettings {
            base_url: url.clone(),
            model: self.oracle_model.clone(),
            timeout: Duration::from_secs(self.oracle_timeout),
        })
    }
}

#[cfg(feature = "server")]
#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the HTTP upload service
    Serve(ServeArgs),
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Where uploads are kept while processed
    #[arg(long, default_value = "uploads", value_name = "PATH")]
    upload_dir: PathBuf,

    /// Where processed archives are kept for download
    #[arg(long, default_value = "processed", value_name = "PATH")]
    processed_dir: PathBuf,

    /// Parent of per-job scratch directories (defaults to the OS temp dir)
    #[arg(long, value_name = "PATH")]
    work_dir: Option<PathBuf>,

    /// Delete processed archives older than this at startup
    #[arg(long, value_name = "HOURS")]
    artifact_ttl_hours: Option<u64>,

    /// Delete each processed archive once it has been downloaded
    #[arg(long)]
    delete_after_download: bool,
}

fn main() -> anyhow::Result<()> {
    #[allow(unused_mut)]
    let mut cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let oracle = cli.oracle.settings();

    #[cfg(feature = "server")]
    {
        if let Some(Command::Serve(args)) = cli.command.take() {
            return serve(args, cli.exclude, oracle);
        }
    }

    clean(&cli, oracle)
}

fn clean(cli: &Cli, oracle: Option<OracleSettings>) -> anyhow::Result<()> {
    let config = Config::builder()
        .root_dir(&cli.dir)
        .output_dir(&cli.output)
        .recursive(!cli.no_subdirs)
        .exclude_patterns(cli.exclude.iter().cloned())
        .dry_run(cli.dry_run)
        .build()
        .context("Failed to build configuration")?;

    if !cli.json {
        print_banner(&config);
    }

    let oracle: Box<dyn DeadCodeOracle> = match oracle {
        Some(settings) => Box::new(
            OllamaOracle::new(&settings).context("Failed to create oracle client")?,
        ),
        None => Box::new(NoopOracle),
    };

    let result = Pipeline::with_oracle(config, oracle)
        .context("Failed to create pipeline")?
        .run()
        .context("Cleaning failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
    } else {
        result.print_summary();
    }

    Ok(())
}

fn print_banner(config: &Config) {
    println!("Scanning directory: {}", config.root_dir.display());
    println!("Output directory:   {}", config.output_dir.display());
    println!("Excluding:          {}", config.exclude_patterns.join(", "));
    println!(
        "Subdirectories:     {}",
        if config.recursive { "yes" } else { "no" }
    );
    if config.dry_run {
        println!("Dry run: no files will be written");
    }
    println!();
}

#[cfg(feature = "server")]
fn serve(
    args: ServeArgs,
    exclude: Vec<String>,
    oracle: Option<OracleSettings>,
) -> anyhow::Result<()> {
    use code_cleaner::server::{self, ServerConfig};

    let config = ServerConfig {
        addr: std::net::SocketAddr::new(args.host, args.port),
        upload_dir: args.upload_dir,
        processed_dir: args.processed_dir,
        work_root: args.work_dir.unwrap_or_else(std::env::temp_dir),
        exclude_patterns: exclude
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        oracle,
        artifact_ttl: args
            .artifact_ttl_hours
            .map(|hours| Duration::from_secs(hours * 3600)),
        delete_after_download: args.delete_after_download,
        ..ServerConfig::default()
    };

    tokio::runtime::Runtime::new()
        .context("Failed to start async runtime")?
        .block_on(server::serve(config))
        .context("Server failed")?;

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("code_cleaner={level},tower_http={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["code-cleaner"]);

        assert_eq!(cli.dir, PathBuf::from("."));
        assert_eq!(cli.output, PathBuf::from("copy"));
        assert!(!cli.no_subdirs);
        assert_eq!(
            cli.exclude,
            vec!["node_modules", ".git", "__pycache__", ".DS_Store"]
        );
    }

    #[test]
    fn test_exclude_list_is_split_on_commas() {
        let cli = Cli::parse_from(["code-cleaner", "-n", "-e", "target,dist", "-o", "clean"]);

        assert!(cli.no_subdirs);
        assert_eq!(cli.exclude, vec!["target", "dist"]);
        assert_eq!(cli.output, PathBuf::from("clean"));
    }

    #[test]
    fn test_oracle_settings_only_with_url() {
        let cli = Cli::parse_from(["code-cleaner", "--oracle-timeout", "5"]);
        if cli.oracle.oracle_url.is_none() {
            assert!(cli.oracle.settings().is_none());
        }

        let cli = Cli::parse_from([
            "code-cleaner",
            "--oracle-url",
            "http://localhost:11434",
            "--oracle-timeout",
            "5",
        ]);
        let settings = cli.oracle.settings().unwrap();
        assert_eq!(settings.base_url, "http://localhost:11434");
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[cfg(feature = "server")]
    #[test]
    fn test_serve_subcommand() {
        let cli = Cli::parse_from([
            "code-cleaner",
            "serve",
            "--port",
            "8080",
            "--delete-after-download",
        ]);

        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, 8080);
                assert!(args.delete_after_download);
                assert_eq!(args.upload_dir, PathBuf::from("uploads"));
                assert_eq!(args.processed_dir, PathBuf::from("processed"));
            }
            None => panic!("expected serve subcommand"),
        }
    }
}
