use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hubmirror::{GistSynchronizer, GitClient, GitHubClient, HttpFetcher, MirrorConfig, SyncEngine};

#[derive(Parser)]
#[command(name = "hubmirror")]
#[command(about = "Make local mirror backups of GitHub repositories and gists")]
#[command(version)]
struct Cli {
    /// Local directory to sync repositories and gists to
    #[arg(value_name = "DIRECTORY")]
    target_directory_base: String,

    /// Configuration file to use (default: ~/.config/hubmirror/main.cfg)
    #[arg(long, value_name = "FILE")]
    config: Option<String>,

    /// GitHub user name; if given, configured users and repositories are ignored
    #[arg(long, value_name = "NAME")]
    user: Option<String>,

    /// Increase verbosity
    #[arg(long)]
    verbose: bool,

    /// Authenticate to the API server (e.g. to raise rate limits); defaults to $GITHUB_TOKEN
    #[arg(long, value_name = "TOKEN")]
    api_token: Option<String>,

    /// Show what would be cloned, updated and written without doing it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let mirror_config = match &cli.user {
        Some(user) => MirrorConfig::for_user(user.clone()),
        None => {
            let path = match &cli.config {
                Some(path) => expand_path(path)?,
                None => MirrorConfig::default_config_path()?,
            };
            MirrorConfig::load(&path)?
        }
    };

    let target_root = expand_path(&cli.target_directory_base)?;

    let github = GitHubClient::from_env(GitHubClient::resolve_token(cli.api_token))?;
    if !github.is_authenticated() {
        warn!("No API token given; anonymous requests are heavily rate limited");
    }

    let engine = SyncEngine::new(
        Box::new(github),
        GitClient::new(cli.verbose),
        GistSynchronizer::new(HttpFetcher::new()),
        target_root,
    );

    if cli.dry_run {
        let actions = engine.dry_run(&mirror_config).await?;
        info!("Dry run: {} items planned, nothing changed", actions.len());
    } else {
        engine.run_sync(&mirror_config).await?;
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(concat!(env!("CARGO_CRATE_NAME"), "=debug,info")))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Warnings and errors on stderr, progress on stdout
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_target(false).without_time())
        .with(filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Failed to expand path: {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
