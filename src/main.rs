use anyhow::{bail, Context};
use clap::Parser;
use repo_knowledge::{
    batch::{self, BatchSettings, Manifest},
    InclusionPolicy, DEFAULT_MAX_FILE_SIZE_KB, DEFAULT_MAX_OUTPUT_SIZE_KB,
};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "repo-knowledge",
    version,
    author,
    about = "Aggregate source repositories into Markdown knowledge files",
    long_about = "Aggregate local source repositories into bounded-size Markdown knowledge files.\n\n\
    Every immediate subdirectory of SOURCE_DIR is treated as a repository unless a \
    manifest lists them explicitly. Each repository produces OUTPUT_DIR/{name}_knowledge.md.\n\n\
    USAGE EXAMPLES:\n  \
      # Process every repository under ./repos\n  \
      repo-knowledge ./repos ./knowledge\n\n  \
      # Smaller documents, smaller files\n  \
      repo-knowledge ./repos ./knowledge --max-repo-size-kb 200 --max-file-size-kb 20\n\n  \
      # Curated batch with per-repository overrides\n  \
      repo-knowledge ./repos ./knowledge --manifest repos.toml"
)]
struct Cli {
    /// Directory containing the repositories
    #[arg(value_name = "SOURCE_DIR")]
    source_dir: PathBuf,

    /// Directory receiving the knowledge files
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Max knowledge file size per repository in KB
    #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_SIZE_KB, value_name = "KB")]
    max_repo_size_kb: u64,

    /// Max individual file size in KB
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE_KB, value_name = "KB")]
    max_file_size_kb: u64,

    /// TOML manifest listing repositories and their size overrides
    #[arg(short, long, value_name = "FILE", env = "REPO_KNOWLEDGE_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Allowed extension (repeatable; replaces the defaults)
    #[arg(long = "include-ext", value_name = "EXT")]
    include_ext: Vec<String>,

    /// Excluded directory name (repeatable; replaces the defaults)
    #[arg(long = "exclude-dir", value_name = "NAME")]
    exclude_dir: Vec<String>,

    /// Excluded file name (repeatable; replaces the defaults)
    #[arg(long = "exclude-file", value_name = "NAME")]
    exclude_file: Vec<String>,

    /// Dry run (don't write files)
    #[arg(long)]
    dry_run: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn policy(&self) -> InclusionPolicy {
        let mut policy = InclusionPolicy::default();
        if !self.include_ext.is_empty() {
            policy = policy.include_extensions(self.include_ext.iter().cloned());
        }
        if !self.exclude_dir.is_empty() {
            policy = policy.exclude_dirs(self.exclude_dir.iter().cloned());
        }
        if !self.exclude_file.is_empty() {
            policy = policy.exclude_files(self.exclude_file.iter().cloned());
        }
        policy
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    if !cli.source_dir.is_dir() {
        bail!(
            "Source directory does not exist: {}",
            cli.source_dir.display()
        );
    }

    if !cli.dry_run {
        batch::prepare_output_dir(&cli.output_dir).context("Failed to create output directory")?;
    }

    let jobs = match &cli.manifest {
        Some(path) => Manifest::load(path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?
            .jobs(&cli.source_dir),
        None => match batch::discover(&cli.source_dir) {
            Ok(jobs) => jobs,
            Err(e) if e.is_no_repositories() => {
                warn!("{}", e);
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to discover repositories"),
        },
    };

    let settings = BatchSettings {
        output_dir: cli.output_dir.clone(),
        max_output_size_kb: cli.max_repo_size_kb,
        max_file_size_kb: cli.max_file_size_kb,
        policy: cli.policy(),
        dry_run: cli.dry_run,
    };

    let report = batch::run_batch(&jobs, &settings);

    if cli.json {
        let json = report.to_json().context("Failed to serialize batch report")?;
        println!("{json}");
    } else {
        report.print_summary();
    }

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        _ if std::env::var_os("RUST_LOG").is_some() => EnvFilter::try_from_default_env()
            .context("Invalid RUST_LOG directive")?,
        0 => EnvFilter::new("repo_knowledge=info"),
        1 => EnvFilter::new("repo_knowledge=debug"),
        _ => EnvFilter::new("repo_knowledge=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
