use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info, warn};

use crate::discovery::{check_announced_total, GistOwner, RemoteGist, RemoteRepository, RemoteSource};

/// Items requested per page (the API maximum)
const PER_PAGE: u8 = 100;

/// Environment variable overriding the API root (GitHub Enterprise)
pub const API_URL_ENV: &str = "GITHUB_API_URL";

/// GitHub client wrapper with optional authentication
pub struct GitHubClient {
    client: Octocrab,
    authenticated: bool,
}

#[derive(Serialize)]
struct PageParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<&'a str>,
    per_page: u8,
    page: u8,
}

#[derive(Deserialize)]
struct SearchPage<T> {
    total_count: u64,
    items: Vec<T>,
}

impl GitHubClient {
    /// Create a client against api.github.com
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_uri(None, token)
    }

    /// Create a client, optionally against a different API root
    /// (GitHub Enterprise, mock servers)
    pub fn with_base_uri(base_uri: Option<&str>, token: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(base_uri) = base_uri {
            builder = builder
                .base_uri(base_uri)
                .with_context(|| format!("Invalid GitHub API base URI: {}", base_uri))?;
        }

        let authenticated = token.is_some();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        let client = builder.build().context("Failed to create GitHub client")?;

        if authenticated {
            info!("Using token authentication for the GitHub API");
        } else {
            info!("Using anonymous GitHub API access (lower rate limits apply)");
        }

        Ok(Self {
            client,
            authenticated,
        })
    }

    /// Create a client against `$GITHUB_API_URL`, or api.github.com when unset
    pub fn from_env(token: Option<String>) -> Result<Self> {
        let base_uri = env::var(API_URL_ENV).ok().filter(|uri| !uri.trim().is_empty());
        Self::with_base_uri(base_uri.as_deref(), token)
    }

    /// Whether requests carry a token
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Pick the API token: explicit value first, then `GITHUB_TOKEN`
    pub fn resolve_token(explicit: Option<String>) -> Option<String> {
        choose_token(explicit, env::var("GITHUB_TOKEN").ok())
    }

    /// Fetch pages of `P` from `route` until one yields no items
    async fn collect_pages<P, T, F>(
        &self,
        route: &str,
        query: Option<&str>,
        mut items_of: F,
    ) -> Result<Vec<T>>
    where
        P: DeserializeOwned + Send,
        T: Send,
        F: FnMut(P) -> Vec<T> + Send,
    {
        let mut items = Vec::new();
        let mut page = 1u8;

        loop {
            let params = PageParams {
                q: query,
                per_page: PER_PAGE,
                page,
            };
            let body: P = self
                .client
                .get(route, Some(&params))
                .await
                .with_context(|| format!("Failed to fetch {} page {}", route, page))?;

            let page_items = items_of(body);
            debug!("Requested {} (page {}): {}", route, page, page_items.len());
            if page_items.is_empty() {
                break;
            }
            items.extend(page_items);

            // GitHub API pagination limit for u8
            if page == u8::MAX {
                warn!("Reached maximum pagination limit ({} pages) for {}", u8::MAX, route);
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

/// First non-blank token of `explicit` and `from_env`
fn choose_token(explicit: Option<String>, from_env: Option<String>) -> Option<String> {
    let non_blank = |token: &String| !token.trim().is_empty();
    explicit.filter(non_blank).or_else(|| from_env.filter(non_blank))
}

#[async_trait]
impl RemoteSource for GitHubClient {
    async fn list_repositories(&self, user: &str) -> Result<Vec<RemoteRepository>> {
        debug!("Fetching repositories for user: {}", user);

        let query = format!("user:{}", user);
        let mut announced = None;
        let repositories = self
            .collect_pages("/search/repositories", Some(&query), |page: SearchPage<RemoteRepository>| {
                announced.get_or_insert(page.total_count);
                page.items
            })
            .await
            .with_context(|| format!("Failed to list repositories of {}", user))?;

        check_announced_total("repositories", announced, repositories.len());

        info!("Found {} repositories for user: {}", repositories.len(), user);
        Ok(repositories)
    }

    async fn list_gists(&self, user: &str) -> Result<Vec<RemoteGist>> {
        debug!("Fetching gists for user: {}", user);

        let route = format!("/users/{}/gists", user);
        let mut gists = self
            .collect_pages(&route, None, |page: Vec<RemoteGist>| page)
            .await
            .with_context(|| format!("Failed to list gists of {}", user))?;

        for gist in &mut gists {
            gist.owner.get_or_insert_with(|| GistOwner {
                login: user.to_string(),
            });
        }

        info!("Found {} gists for user: {}", gists.len(), user);
        Ok(gists)
    }

    async fn get_repository(&self, full_name: &str) -> Result<RemoteRepository> {
        debug!("Fetching repository: {}", full_name);

        let route = format!("/repos/{}", full_name);
        self.client
            .get(route, None::<&()>)
            .await
            .with_context(|| format!("Failed to get repository {}", full_name))
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}
