//! Thin GitHub REST client.
//!
//! Fetches a single page of a list endpoint and exposes the pagination and rate-limit
//! metadata needed to plan the remaining requests.

use crate::types::RepositoryIdentity;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use http::HeaderMap;
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const PER_PAGE: &str = "100";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Label {
    pub name: String,
}

/// Link from an issue to the pull request it represents.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PullRequestLink {
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Issue {
    pub number: u64,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pull_request: Option<PullRequestLink>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Issue {
    /// GitHub lists pull requests as issues too; they carry a pull request link.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request
            .as_ref()
            .and_then(|pr| pr.html_url.as_deref())
            .is_some_and(|url| !url.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PullRequest {
    pub id: u64,
    pub state: String,
    #[serde(default)]
    pub merged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `X-RateLimit-Remaining` as reported with this page, if present.
    pub rate_limit_remaining: Option<u32>,
    /// Target of the `rel="last"` link, absent on single-page results.
    pub last: Option<Url>,
}

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    base_url: Url,
    timeout: Duration,
}

impl GitHubClient {
    /// Builds a client against `base_url`, authenticated with `token` when given.
    ///
    /// Every page fetch is bounded by `timeout`.
    pub fn new(token: Option<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("invalid API URL {base_url}"))?;

        // One request per page; failed pages are dropped, never retried.
        let mut builder = Octocrab::builder()
            .add_retry_config(RetryConfig::None)
            .base_uri(base_url.as_str())?;
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }

        Ok(Self {
            octocrab: builder.build()?,
            base_url,
            timeout,
        })
    }

    /// Builds the first-page URL of a repository list endpoint (`issues` or `pulls`).
    pub fn resource_url(
        &self,
        repo: &RepositoryIdentity,
        resource: &str,
        state: &str,
        sort: &str,
    ) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/repos/{}/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            repo.owner,
            repo.name,
            resource
        ))?;

        url.query_pairs_mut()
            .append_pair("sort", sort)
            .append_pair("direction", "asc")
            .append_pair("state", state)
            .append_pair("per_page", PER_PAGE);
        Ok(url)
    }

    /// Fetches and decodes one page.
    pub async fn fetch_page<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>> {
        tokio::time::timeout(self.timeout, self.fetch_page_inner(url))
            .await
            .map_err(|_| anyhow!("request to {url} timed out after {:?}", self.timeout))?
    }

    async fn fetch_page_inner<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>> {
        let response = self.octocrab._get(url.as_str()).await?;

        let status = response.status();
        let rate_limit_remaining = rate_limit_remaining(response.headers());
        let last = last_page_link(response.headers());
        let body = self.octocrab.body_to_string(response).await?;

        if !status.is_success() {
            bail!("GET {url} failed with {status}: {body}");
        }

        let items: Vec<T> =
            serde_json::from_str(&body).with_context(|| format!("invalid response from {url}"))?;

        Ok(Page {
            items,
            rate_limit_remaining,
            last,
        })
    }
}

fn rate_limit_remaining(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(RATE_LIMIT_REMAINING)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn last_page_link(headers: &HeaderMap) -> Option<Url> {
    let value = headers.get(http::header::LINK)?.to_str().ok()?;
    parse_link_header(value, "last")
}

/// Extracts the target of `rel` from an RFC 8288 `Link` header value.
pub fn parse_link_header(value: &str, rel: &str) -> Option<Url> {
    value.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;

        let matches = parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .map(|r| r.trim_matches('"'))
                .is_some_and(|r| r.split_whitespace().any(|r| r == rel))
        });

        if matches {
            Url::parse(target).ok()
        } else {
            None
        }
    })
}
