use anyhow::{Context, Result};
use dirs::home_dir;
use ini::Ini;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::MirrorError;

const USER_PREFIX: &str = "user ";
const REPOSITORY_PREFIX: &str = "repository ";

/// What to mirror: whole accounts plus individually named repositories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Users whose every repository and gist is mirrored
    pub whole_users: BTreeSet<String>,

    /// Single repositories (`owner/name`) not covered by a whole user
    pub additional_repositories: BTreeSet<String>,
}

impl MirrorConfig {
    /// Configuration that mirrors exactly one user, ignoring any config file
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            whole_users: BTreeSet::from([user.into()]),
            additional_repositories: BTreeSet::new(),
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MirrorError::ConfigNotFound(path.to_path_buf()).into());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to load config file: {:?}", path))
    }

    /// Parse configuration file contents
    pub fn parse(content: &str) -> Result<Self> {
        let ini = Ini::load_from_str(content).context("Failed to parse configuration")?;

        let has_unsectioned = ini
            .section(None::<String>)
            .is_some_and(|properties| properties.iter().next().is_some());
        if has_unsectioned {
            return Err(MirrorError::MalformedSection("<no section>".to_string()).into());
        }

        let sections: Vec<&str> = ini.sections().flatten().collect();
        if sections.is_empty() {
            return Err(MirrorError::EmptyConfig.into());
        }

        let mut config = Self::default();
        for section in sections {
            config.add_section(section)?;
        }
        config.drop_covered_repositories();

        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let home = home_dir().context("Failed to get user home directory")?;

        Ok(home
            .join(".config")
            .join(env!("CARGO_PKG_NAME"))
            .join("main.cfg"))
    }

    fn add_section(&mut self, section: &str) -> Result<(), MirrorError> {
        let malformed = || MirrorError::MalformedSection(section.to_string());

        if let Some(rest) = section.strip_prefix(REPOSITORY_PREFIX) {
            let repository = rest.trim();
            match repository.split_once('/') {
                Some((owner, name))
                    if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
                {
                    self.additional_repositories.insert(repository.to_string());
                    Ok(())
                }
                _ => Err(malformed()),
            }
        } else if let Some(rest) = section.strip_prefix(USER_PREFIX) {
            let user = rest.trim();
            if user.is_empty() {
                return Err(malformed());
            }
            self.whole_users.insert(user.to_string());
            Ok(())
        } else {
            Err(malformed())
        }
    }

    fn drop_covered_repositories(&mut self) {
        let whole_users = &self.whole_users;
        self.additional_repositories.retain(|global_name| {
            let owner = global_name.split('/').next().unwrap_or_default();
            if whole_users.contains(owner) {
                info!(
                    "Request for repository \"{}\" covered by request for user \"{}\", already.",
                    global_name, owner
                );
                false
            } else {
                true
            }
        });
    }
}
