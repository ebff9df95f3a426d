//! hubmirror - Local Mirror Backups of GitHub Repositories and Gists
//!
//! hubmirror keeps a bare mirror clone of every repository, and a plain copy
//! of every single-file gist, owned by the configured GitHub users.
//!
//! ## Local Layout
//!
//! - `<base>/repositories/<owner>/<name>/`: `git clone --mirror` output,
//!   refreshed with `git remote update --prune` on later runs
//! - `<base>/gists/<owner>/<gist-id>/<filename>`: raw gist content
//!
//! ## Modules
//!
//! - [`config`]: Section-based configuration file
//! - [`discovery`]: Remote data model and the [`RemoteSource`] capability
//! - [`github`]: GitHub API enumeration
//! - [`sync`]: Planning and running a mirroring pass
//! - [`git`]: Mirror clones through the git executable
//! - [`gist`]: Gist content retrieval

pub mod config;
pub mod discovery;
pub mod error;
pub mod gist;
pub mod git;
pub mod github;
pub mod sync;

pub use config::MirrorConfig;
pub use discovery::{RemoteGist, RemoteRepository, RemoteSource};
pub use error::MirrorError;
pub use gist::{ContentFetcher, GistAction, GistSynchronizer, HttpFetcher};
pub use git::{GitClient, RepoAction};
pub use github::GitHubClient;
pub use sync::{SyncEngine, SyncPlan, SyncSummary};
