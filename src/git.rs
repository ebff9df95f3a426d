use anyhow::{Context, Result};
use std::borrow::Cow;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::discovery::RemoteRepository;
use crate::error::MirrorError;

/// Environment variable overriding the git executable
pub const GIT_PROGRAM_ENV: &str = "HUBMIRROR_GIT";

/// Git operations handler for bare mirror clones
#[derive(Debug, Clone)]
pub struct GitClient {
    program: String,
    verbose: bool,
}

/// What synchronizing a repository amounts to, decided by whether the
/// local mirror exists yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoAction {
    /// First run: `git clone --mirror`
    Clone { clone_url: String, target: PathBuf },
    /// Later runs: `git remote update --prune` inside the mirror
    Update { target: PathBuf },
}

impl RepoAction {
    pub fn target(&self) -> &Path {
        match self {
            RepoAction::Clone { target, .. } | RepoAction::Update { target } => target,
        }
    }
}

impl fmt::Display for RepoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoAction::Clone { clone_url, target } => {
                write!(f, "clone {} -> {}", clone_url, target.display())
            }
            RepoAction::Update { target } => write!(f, "update {}", target.display()),
        }
    }
}

impl GitClient {
    /// Create a git client using `git` from PATH, or `$HUBMIRROR_GIT`
    pub fn new(verbose: bool) -> Self {
        let program = std::env::var(GIT_PROGRAM_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "git".to_string());
        Self::with_program(program, verbose)
    }

    pub fn with_program(program: impl Into<String>, verbose: bool) -> Self {
        Self {
            program: program.into(),
            verbose,
        }
    }

    /// Local mirror location: `<root>/repositories/<owner>/<name>`
    pub fn repository_directory(target_root: &Path, repo: &RemoteRepository) -> PathBuf {
        target_root.join("repositories").join(&repo.full_name)
    }

    /// Decide between clone and update without touching anything
    pub fn plan(&self, repo: &RemoteRepository, target_root: &Path) -> RepoAction {
        let target = Self::repository_directory(target_root, repo);
        if target.exists() {
            RepoAction::Update { target }
        } else {
            RepoAction::Clone {
                clone_url: repo.clone_url.clone(),
                target,
            }
        }
    }

    /// Bring the local mirror of `repo` up to date, cloning it if needed
    pub async fn sync_repository(
        &self,
        repo: &RemoteRepository,
        target_root: &Path,
    ) -> Result<RepoAction> {
        let action = self.plan(repo, target_root);
        self.execute(&action).await?;
        Ok(action)
    }

    /// Run the git invocation for a planned action
    pub async fn execute(&self, action: &RepoAction) -> Result<()> {
        match action {
            RepoAction::Clone { clone_url, target } => {
                create_parent_directories(target).await?;
                let args: Vec<OsString> = vec![
                    "clone".into(),
                    "--mirror".into(),
                    clone_url.into(),
                    target.into(),
                ];
                self.run(&args, None).await
            }
            RepoAction::Update { target } => {
                let args: Vec<OsString> = vec!["remote".into(), "update".into(), "--prune".into()];
                self.run(&args, Some(target)).await
            }
        }
    }

    async fn run(&self, args: &[OsString], cwd: Option<&Path>) -> Result<()> {
        let flat = std::iter::once(Cow::from(self.program.as_str()))
            .chain(args.iter().map(|arg| arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ");
        match cwd {
            Some(dir) => debug!("# ( cd {} && {} )", dir.display(), flat),
            None => debug!("# {}", flat),
        }

        let mut command = AsyncCommand::new(&self.program);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        if !self.verbose {
            command.stdout(Stdio::null());
        }

        let status = command
            .status()
            .await
            .with_context(|| format!("Failed to execute {}", self.program))?;

        if !status.success() {
            return Err(MirrorError::CommandFailed {
                command: flat,
                status: status.to_string(),
            }
            .into());
        }

        debug!("Finished: {}", flat);
        Ok(())
    }
}

/// Create the directories leading up to `path`.
///
/// An already existing directory is fine; any other failure is returned.
pub(crate) async fn create_parent_directories(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };
    if parent.is_dir() {
        return Ok(());
    }

    match tokio::fs::create_dir_all(parent).await {
        Ok(()) => {
            debug!("# mkdir {}", parent.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && parent.is_dir() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to create directory {}", parent.display())),
    }
}
