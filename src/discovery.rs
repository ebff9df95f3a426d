//! Remote discovery abstraction layer
//!
//! The types here are the snapshot of remote metadata a run works from, and
//! [`RemoteSource`] is the capability the sync planner needs from a hosting
//! provider. [`crate::github::GitHubClient`] is the production implementation.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::warn;

/// A repository as reported by the hosting provider
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteRepository {
    /// `owner/name`
    pub full_name: String,

    /// HTTPS clone URL
    pub clone_url: String,
}

/// A gist as reported by the hosting provider
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteGist {
    pub id: String,

    /// Missing for anonymous gists
    #[serde(default)]
    pub owner: Option<GistOwner>,

    /// Files keyed and therefore ordered by filename
    #[serde(default)]
    pub files: BTreeMap<String, GistFile>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GistOwner {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GistFile {
    pub filename: String,
    pub raw_url: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl RemoteGist {
    /// Login of the owning account, if the provider reported one
    pub fn owner_login(&self) -> Option<&str> {
        self.owner.as_ref().map(|owner| owner.login.as_str())
    }

    /// The file that gets mirrored: the first one by filename
    pub fn primary_file(&self) -> Option<&GistFile> {
        self.files.values().next()
    }
}

/// Capability to enumerate a provider's repositories and gists
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Every repository owned by `user`
    async fn list_repositories(&self, user: &str) -> Result<Vec<RemoteRepository>>;

    /// Every gist owned by `user`
    async fn list_gists(&self, user: &str) -> Result<Vec<RemoteGist>>;

    /// A single repository by `owner/name`
    async fn get_repository(&self, full_name: &str) -> Result<RemoteRepository>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Compare what the provider announced against what paging produced.
///
/// A mismatch is logged and reported as `false`; the caller keeps whatever
/// it retrieved.
pub fn check_announced_total(kind: &str, announced: Option<u64>, retrieved: usize) -> bool {
    match announced {
        Some(announced) if announced != retrieved as u64 => {
            warn!(
                "{} {} announced, but {} {} retrieved",
                announced, kind, retrieved, kind
            );
            false
        }
        _ => true,
    }
}
