//! Sync Engine - plans and runs a mirroring pass
//!
//! A pass has two strictly separate phases. Planning enumerates everything
//! the configuration asks for and fixes the order of the work list;
//! execution then walks that list one item at a time. Any fatal error during
//! execution ends the pass immediately.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::MirrorConfig;
use crate::discovery::{RemoteGist, RemoteRepository, RemoteSource};
use crate::gist::{GistAction, GistSynchronizer};
use crate::git::{GitClient, RepoAction};

/// Everything a pass will touch, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Sorted case-insensitively by full name
    pub repositories: Vec<RemoteRepository>,

    /// In enumeration order
    pub gists: Vec<RemoteGist>,
}

/// One entry of the combined work list
#[derive(Debug, Clone, Copy)]
pub struct WorkItem<'a> {
    /// Zero-based position in the combined list
    pub index: usize,
    /// Length of the combined list
    pub count: usize,
    pub kind: WorkKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum WorkKind<'a> {
    Repository(&'a RemoteRepository),
    Gist(&'a RemoteGist),
}

impl WorkItem<'_> {
    /// `[ i/count]`, with `i` one-based and padded to the width of `count`
    pub fn progress_prefix(&self) -> String {
        let width = self.count.to_string().len();
        format!("[{:>width$}/{}]", self.index + 1, self.count, width = width)
    }
}

impl SyncPlan {
    pub fn len(&self) -> usize {
        self.repositories.len() + self.gists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Repositories first, then gists, indexed across both
    pub fn work_items(&self) -> impl Iterator<Item = WorkItem<'_>> {
        let count = self.len();
        let repositories = self.repositories.iter().map(WorkKind::Repository);
        let gists = self.gists.iter().map(WorkKind::Gist);

        repositories
            .chain(gists)
            .enumerate()
            .map(move |(index, kind)| WorkItem { index, count, kind })
    }
}

/// Enumerate everything `config` asks for.
///
/// Paged listings may repeat an item, so repositories and gists are
/// deduplicated by full name and ID.
pub async fn plan(source: &dyn RemoteSource, config: &MirrorConfig) -> Result<SyncPlan> {
    let mut repositories = Vec::new();
    let mut gists = Vec::new();

    for user in &config.whole_users {
        repositories.extend(
            source
                .list_repositories(user)
                .await
                .with_context(|| format!("Failed to get repositories for user {}", user))?,
        );
        gists.extend(
            source
                .list_gists(user)
                .await
                .with_context(|| format!("Failed to get gists for user {}", user))?,
        );
    }

    for global_name in &config.additional_repositories {
        repositories.push(
            source
                .get_repository(global_name)
                .await
                .with_context(|| format!("Failed to get repository {}", global_name))?,
        );
    }

    repositories.sort_by_cached_key(|repo| repo.full_name.to_lowercase());
    repositories.dedup_by(|a, b| a.full_name == b.full_name);

    let mut seen_gists = BTreeSet::new();
    gists.retain(|gist: &RemoteGist| seen_gists.insert(gist.id.clone()));

    debug!(
        "Planned {} repositories and {} gists",
        repositories.len(),
        gists.len()
    );
    Ok(SyncPlan {
        repositories,
        gists,
    })
}

/// Planned action for one work item, as reported by a dry run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Repository(RepoAction),
    Gist(GistAction),
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::Repository(action) => write!(f, "{}", action),
            PlannedAction::Gist(GistAction::Write { raw_url, target }) => {
                write!(f, "write {} -> {}", raw_url, target.display())
            }
            PlannedAction::Gist(GistAction::Empty) => write!(f, "skip (no files)"),
            PlannedAction::Gist(GistAction::Skipped { reason }) => write!(f, "skip ({})", reason),
        }
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub cloned: usize,
    pub updated: usize,
    pub gists_written: usize,
    pub gists_skipped: usize,
    pub duration: Duration,
}

impl SyncSummary {
    fn record_repository(&mut self, action: &RepoAction) {
        match action {
            RepoAction::Clone { .. } => self.cloned += 1,
            RepoAction::Update { .. } => self.updated += 1,
        }
    }

    fn record_gist(&mut self, action: &GistAction) {
        match action {
            GistAction::Write { .. } => self.gists_written += 1,
            GistAction::Empty | GistAction::Skipped { .. } => self.gists_skipped += 1,
        }
    }
}

/// The main sync engine that orchestrates mirroring
pub struct SyncEngine {
    source: Box<dyn RemoteSource>,
    git_client: GitClient,
    gist_synchronizer: GistSynchronizer,
    target_root: PathBuf,
}

impl SyncEngine {
    pub fn new(
        source: Box<dyn RemoteSource>,
        git_client: GitClient,
        gist_synchronizer: GistSynchronizer,
        target_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            git_client,
            gist_synchronizer,
            target_root: target_root.into(),
        }
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Run a complete pass: enumerate, then mirror every item
    pub async fn run_sync(&self, config: &MirrorConfig) -> Result<SyncSummary> {
        let start_time = Instant::now();

        info!(
            "Discovering repositories and gists from {}",
            self.source.provider_name()
        );
        let plan = plan(self.source.as_ref(), config)
            .await
            .context("Failed to discover repositories and gists")?;

        let mut summary = self.execute(&plan).await?;
        summary.duration = start_time.elapsed();

        info!(
            "Sync completed in {:.2}s: {} cloned, {} updated, {} gists written, {} gists skipped",
            summary.duration.as_secs_f64(),
            summary.cloned,
            summary.updated,
            summary.gists_written,
            summary.gists_skipped
        );
        Ok(summary)
    }

    /// Walk the work list of `plan` in order
    pub async fn execute(&self, plan: &SyncPlan) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();

        for item in plan.work_items() {
            let prefix = item.progress_prefix();
            match item.kind {
                WorkKind::Repository(repo) => {
                    info!("{} Processing repository \"{}\"...", prefix, repo.full_name);
                    let action = self
                        .git_client
                        .sync_repository(repo, &self.target_root)
                        .await
                        .with_context(|| format!("Failed to mirror repository {}", repo.full_name))?;
                    summary.record_repository(&action);
                }
                WorkKind::Gist(gist) => {
                    let Some(owner_login) = gist.owner_login() else {
                        warn!("Gist \"{}\" has no owner, skipping", gist.id);
                        summary.gists_skipped += 1;
                        continue;
                    };
                    if let Some(file) = gist.primary_file() {
                        info!(
                            "{} Processing gist \"{}\" (ID {}, {})...",
                            prefix,
                            file.filename,
                            gist.id,
                            file.language.as_deref().unwrap_or("unknown language")
                        );
                    }
                    let action = self
                        .gist_synchronizer
                        .sync_gist(gist, &self.target_root, owner_login)
                        .await
                        .with_context(|| format!("Failed to mirror gist {}", gist.id))?;
                    summary.record_gist(&action);
                }
            }
        }

        Ok(summary)
    }

    /// Enumerate and report what a pass would do, without doing it
    pub async fn dry_run(&self, config: &MirrorConfig) -> Result<Vec<PlannedAction>> {
        info!("Running dry-run sync analysis");

        let plan = plan(self.source.as_ref(), config)
            .await
            .context("Failed to discover repositories and gists")?;

        let mut actions = Vec::with_capacity(plan.len());
        for item in plan.work_items() {
            let action = match item.kind {
                WorkKind::Repository(repo) => {
                    PlannedAction::Repository(self.git_client.plan(repo, &self.target_root))
                }
                WorkKind::Gist(gist) => match gist.owner_login() {
                    Some(owner_login) => PlannedAction::Gist(self.gist_synchronizer.plan(
                        gist,
                        &self.target_root,
                        owner_login,
                    )),
                    None => PlannedAction::Gist(GistAction::Skipped {
                        reason: "gist has no owner".to_string(),
                    }),
                },
            };
            info!("{} {}", item.progress_prefix(), action);
            actions.push(action);
        }

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{GistFile, GistOwner, MockRemoteSource};
    use std::collections::BTreeMap;

    fn repo(full_name: &str) -> RemoteRepository {
        RemoteRepository {
            full_name: full_name.to_string(),
            clone_url: format!("https://github.com/{}.git", full_name),
        }
    }

    fn gist(id: &str, owner: &str) -> RemoteGist {
        RemoteGist {
            id: id.to_string(),
            owner: Some(GistOwner {
                login: owner.to_string(),
            }),
            files: BTreeMap::from([(
                "note.txt".to_string(),
                GistFile {
                    filename: "note.txt".to_string(),
                    raw_url: format!("https://gist.example/{}/note.txt", id),
                    language: None,
                },
            )]),
        }
    }

    fn repositories_of(user: &str) -> Vec<RemoteRepository> {
        match user {
            "alice" => vec![repo("alice/zebra"), repo("alice/Apple")],
            "bob" => vec![repo("bob/middle")],
            _ => Vec::new(),
        }
    }

    fn gists_of(user: &str) -> Vec<RemoteGist> {
        match user {
            "alice" => vec![gist("a2", "alice"), gist("a1", "alice")],
            "bob" => vec![gist("b1", "bob")],
            _ => Vec::new(),
        }
    }

    fn mock_source() -> MockRemoteSource {
        let mut source = MockRemoteSource::new();
        source
            .expect_list_repositories()
            .times(2)
            .returning(|user| Ok(repositories_of(user)));
        source
            .expect_list_gists()
            .times(2)
            .returning(|user| Ok(gists_of(user)));
        source
            .expect_get_repository()
            .times(1)
            .returning(|_| Ok(repo("carol/Beta")));
        source
    }

    fn config() -> MirrorConfig {
        MirrorConfig {
            whole_users: BTreeSet::from(["bob".to_string(), "alice".to_string()]),
            additional_repositories: BTreeSet::from(["carol/Beta".to_string()]),
        }
    }

    #[tokio::test]
    async fn test_plan_orders_repositories_case_insensitively() {
        let source = mock_source();

        let plan = plan(&source, &config()).await.expect("plan should succeed");

        let names: Vec<&str> = plan.repositories.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["alice/Apple", "alice/zebra", "bob/middle", "carol/Beta"]
        );
    }

    #[tokio::test]
    async fn test_plan_keeps_gist_order_by_sorted_user() {
        let source = mock_source();

        let plan = plan(&source, &config()).await.expect("plan should succeed");

        let ids: Vec<&str> = plan.gists.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a1", "b1"]);
    }

    #[tokio::test]
    async fn test_plan_drops_repeated_items() {
        let mut source = MockRemoteSource::new();
        source
            .expect_list_repositories()
            .times(1)
            .returning(|_| Ok(vec![repo("alice/x"), repo("alice/y"), repo("alice/x")]));
        source
            .expect_list_gists()
            .times(1)
            .returning(|_| Ok(vec![gist("g1", "alice"), gist("g2", "alice"), gist("g1", "alice")]));

        let plan = plan(&source, &MirrorConfig::for_user("alice"))
            .await
            .expect("plan should succeed");

        let names: Vec<&str> = plan.repositories.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["alice/x", "alice/y"]);
        let ids: Vec<&str> = plan.gists.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2"]);
        assert_eq!(plan.work_items().last().map(|item| item.count), Some(4));
    }

    #[tokio::test]
    async fn test_plan_propagates_enumeration_errors() {
        let mut source = MockRemoteSource::new();
        source
            .expect_list_repositories()
            .returning(|_| Err(anyhow::anyhow!("rate limited")));

        let result = plan(&source, &MirrorConfig::for_user("alice")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_work_items_share_one_index_space() {
        let plan = SyncPlan {
            repositories: vec![repo("a/one"), repo("a/two")],
            gists: vec![gist("g1", "a")],
        };

        let items: Vec<WorkItem<'_>> = plan.work_items().collect();

        assert_eq!(items.len(), 3);
        assert!(matches!(items[0].kind, WorkKind::Repository(r) if r.full_name == "a/one"));
        assert!(matches!(items[2].kind, WorkKind::Gist(g) if g.id == "g1"));
        assert!(items.iter().all(|item| item.count == 3));
        assert_eq!(items[2].index, 2);
    }

    #[test]
    fn test_progress_prefix_padding() {
        let repo = repo("a/b");
        let item = |index, count| WorkItem {
            index,
            count,
            kind: WorkKind::Repository(&repo),
        };

        assert_eq!(item(0, 9).progress_prefix(), "[1/9]");
        assert_eq!(item(2, 12).progress_prefix(), "[ 3/12]");
        assert_eq!(item(99, 100).progress_prefix(), "[100/100]");
    }

    #[test]
    fn test_planned_action_display() {
        let action = PlannedAction::Gist(GistAction::Skipped {
            reason: "bad name".to_string(),
        });
        assert_eq!(action.to_string(), "skip (bad name)");
    }
}
