//! Sources of issues and pull requests.
//!
//! The collector only talks to the [`Repository`] capability, so any backend able to list
//! issues and pull requests by state can feed it. [`GitHubRepository`] is the GitHub one.

use crate::github::{GitHubClient, Issue, PullRequest};
use crate::paginator;
use crate::types::RepositoryIdentity;
use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;

pub trait Repository: Send + Sync {
    fn identity(&self) -> &RepositoryIdentity;

    /// All issues in `state` ("open" or "closed"), ascending by `sort`.
    fn issues<'a>(&'a self, state: &'a str, sort: &'a str) -> BoxFuture<'a, Result<Vec<Issue>>>;

    /// All pull requests in `state` ("open" or "closed"), ascending by `sort`.
    fn pull_requests<'a>(
        &'a self,
        state: &'a str,
        sort: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PullRequest>>>;
}

pub struct GitHubRepository {
    identity: RepositoryIdentity,
    client: GitHubClient,
}

impl GitHubRepository {
    pub fn new(identity: RepositoryIdentity, client: GitHubClient) -> Self {
        Self { identity, client }
    }

    /// Loads every page of a listing.
    ///
    /// Failing to load the first page is an error. Later pages are fetched concurrently
    /// and silently dropped when they fail.
    async fn list<T>(&self, resource: &str, state: &str, sort: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self
            .client
            .resource_url(&self.identity, resource, state, sort)?;

        tracing::debug!(repo = %self.identity, resource, state, page = 1, "Loading first page");
        let first = self
            .client
            .fetch_page::<T>(&url)
            .await
            .with_context(|| format!("failed to load {state} {resource} of {}", self.identity))?;

        let client = self.client.clone();
        let items = paginator::collect_pages(&url, first, move |page_url| {
            let client = client.clone();
            async move {
                client
                    .fetch_page::<T>(&page_url)
                    .await
                    .map(|page| page.items)
            }
        })
        .await;

        tracing::debug!(repo = %self.identity, "Loaded {} {} {}", items.len(), state, resource);
        Ok(items)
    }
}

impl Repository for GitHubRepository {
    fn identity(&self) -> &RepositoryIdentity {
        &self.identity
    }

    fn issues<'a>(&'a self, state: &'a str, sort: &'a str) -> BoxFuture<'a, Result<Vec<Issue>>> {
        self.list("issues", state, sort).boxed()
    }

    fn pull_requests<'a>(
        &'a self,
        state: &'a str,
        sort: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PullRequest>>> {
        self.list("pulls", state, sort).boxed()
    }
}
