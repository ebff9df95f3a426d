//! Gist mirroring
//!
//! Every gist is stored as a plain file at
//! `<root>/gists/<owner>/<gist-id>/<filename>`. Only single-file gists are
//! fully supported: for anything else the first file by name is kept and a
//! warning is logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::discovery::RemoteGist;
use crate::error::MirrorError;
use crate::git::create_parent_directories;

/// Capability to fetch a text document by URL
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// [`ContentFetcher`] over HTTP.
///
/// The underlying client is only built on the first fetch, so runs that
/// never touch a gist never pay for it.
#[derive(Default)]
pub struct HttpFetcher {
    client: OnceCell<reqwest::Client>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> Result<&reqwest::Client> {
        self.client
            .get_or_try_init(|| async {
                debug!("Initializing HTTP client");
                reqwest::Client::builder()
                    .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .context("Failed to create HTTP client")
            })
            .await
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client()
            .await?
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?
            .error_for_status()
            .with_context(|| format!("Unexpected response for {}", url))?;

        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }
}

/// What mirroring a gist amounts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GistAction {
    /// Fetch `raw_url` and overwrite `target` with it
    Write { raw_url: String, target: PathBuf },
    /// The gist has no files
    Empty,
    /// A path component sanitized to nothing
    Skipped { reason: String },
}

/// Make a remote-supplied name safe to use as a single path component.
///
/// Slashes become dashes first, then leading dots are stripped.
pub fn sanitize_path_component(text: &str) -> Result<String, MirrorError> {
    let replaced = text.replace('/', "-");
    let stripped = replaced.trim_start_matches('.');

    if stripped.is_empty() {
        return Err(MirrorError::EmptyPathComponent(text.to_string()));
    }
    Ok(stripped.to_string())
}

pub struct GistSynchronizer {
    fetcher: Box<dyn ContentFetcher>,
}

impl GistSynchronizer {
    pub fn new(fetcher: impl ContentFetcher + 'static) -> Self {
        Self {
            fetcher: Box::new(fetcher),
        }
    }

    /// Local file for a gist's file
    pub fn gist_file_path(
        target_root: &Path,
        owner_login: &str,
        gist_id: &str,
        filename: &str,
    ) -> Result<PathBuf, MirrorError> {
        Ok(target_root
            .join("gists")
            .join(sanitize_path_component(owner_login)?)
            .join(sanitize_path_component(gist_id)?)
            .join(sanitize_path_component(filename)?))
    }

    /// Decide what to do with `gist` without touching anything
    pub fn plan(&self, gist: &RemoteGist, target_root: &Path, owner_login: &str) -> GistAction {
        let file_count = gist.files.len();
        if file_count != 1 {
            warn!(
                "Gist \"{}\" contains {} files, expected a single one",
                gist.id, file_count
            );
        }

        let Some(file) = gist.primary_file() else {
            return GistAction::Empty;
        };

        match Self::gist_file_path(target_root, owner_login, &gist.id, &file.filename) {
            Ok(target) => GistAction::Write {
                raw_url: file.raw_url.clone(),
                target,
            },
            Err(e) => {
                warn!("Skipping gist \"{}\": {}", gist.id, e);
                GistAction::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Mirror `gist` below `target_root`
    pub async fn sync_gist(
        &self,
        gist: &RemoteGist,
        target_root: &Path,
        owner_login: &str,
    ) -> Result<GistAction> {
        let action = self.plan(gist, target_root, owner_login);
        self.execute(&action).await?;
        Ok(action)
    }

    /// Carry out a planned action
    pub async fn execute(&self, action: &GistAction) -> Result<()> {
        let GistAction::Write { raw_url, target } = action else {
            return Ok(());
        };

        create_parent_directories(target).await?;
        let content = self.fetcher.fetch_text(raw_url).await?;
        tokio::fs::write(target, content)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;

        debug!("Wrote {}", target.display());
        Ok(())
    }
}
