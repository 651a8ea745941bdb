//! Metric collection for one repository.
//!
//! This module implements the four collection tasks (opened/closed issues, opened/closed
//! pull requests) and [`retrieve`], which runs them concurrently and merges their records
//! into a single [`MetricsBatch`]. A batch is only returned when every task succeeded.

use crate::fetcher::Collection;
use crate::github::PullRequest;
use crate::metrics::{self, MetricRecord, MetricsBatch};
use crate::repository::Repository;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;

const OPEN: &str = "open";
const CLOSED: &str = "closed";
const SORT_UPDATED: &str = "updated";

pub async fn collect_opened_issues(repo: &dyn Repository) -> Result<Vec<MetricRecord>> {
    collect_issues(repo, OPEN).await
}

pub async fn collect_closed_issues(repo: &dyn Repository) -> Result<Vec<MetricRecord>> {
    collect_issues(repo, CLOSED).await
}

pub async fn collect_opened_pull_requests(repo: &dyn Repository) -> Result<Vec<MetricRecord>> {
    let pull_requests = repo.pull_requests(OPEN, SORT_UPDATED).await?;
    Ok(opened_pull_request_records(&pull_requests, Utc::now()))
}

pub async fn collect_closed_pull_requests(repo: &dyn Repository) -> Result<Vec<MetricRecord>> {
    let pull_requests = repo.pull_requests(CLOSED, SORT_UPDATED).await?;
    let mut items = vec![MetricRecord::count("pull_requests.closed", pull_requests.len())];
    items.extend(metrics::pull_request_records(&pull_requests));
    Ok(items)
}

async fn collect_issues(repo: &dyn Repository, state: &str) -> Result<Vec<MetricRecord>> {
    let issues = repo.issues(state, SORT_UPDATED).await?;
    let mut items = vec![MetricRecord::count(format!("issues.{state}"), issues.len())];
    items.extend(metrics::issue_records(&issues));
    Ok(items)
}

/// Records for the open pull requests, which must be sorted by ascending update time.
///
/// The staleness record is derived from the first (least recently updated) entry and
/// omitted when there are no open pull requests.
pub fn opened_pull_request_records(
    pull_requests: &[PullRequest],
    now: DateTime<Utc>,
) -> Vec<MetricRecord> {
    let mut items = vec![MetricRecord::count("pull_requests.open", pull_requests.len())];

    if let Some(oldest) = pull_requests.first() {
        items.extend(metrics::pull_request_records(pull_requests));
        items.push(MetricRecord::count(
            "pull_requests.least_recently_updated_days",
            metrics::staleness_days(oldest.updated_at, now),
        ));
    }

    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionTask {
    OpenedIssues,
    ClosedIssues,
    OpenedPullRequests,
    ClosedPullRequests,
}

impl CollectionTask {
    const ALL: [CollectionTask; 4] = [
        CollectionTask::OpenedIssues,
        CollectionTask::ClosedIssues,
        CollectionTask::OpenedPullRequests,
        CollectionTask::ClosedPullRequests,
    ];

    async fn run(self, repo: &dyn Repository) -> Result<Vec<MetricRecord>> {
        match self {
            CollectionTask::OpenedIssues => collect_opened_issues(repo).await,
            CollectionTask::ClosedIssues => collect_closed_issues(repo).await,
            CollectionTask::OpenedPullRequests => collect_opened_pull_requests(repo).await,
            CollectionTask::ClosedPullRequests => collect_closed_pull_requests(repo).await,
        }
    }
}

impl fmt::Display for CollectionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectionTask::OpenedIssues => "opened issues",
            CollectionTask::ClosedIssues => "closed issues",
            CollectionTask::OpenedPullRequests => "opened pull requests",
            CollectionTask::ClosedPullRequests => "closed pull requests",
        };
        f.write_str(name)
    }
}

/// Runs the four collection tasks concurrently and merges their records.
///
/// Waits for every task to finish. If any of them failed, the first failure is returned
/// and no batch is produced.
pub async fn retrieve(repo: Arc<dyn Repository>) -> Result<MetricsBatch> {
    let records = Arc::new(Collection::default());
    let mut tasks = JoinSet::new();

    for task in CollectionTask::ALL {
        let repo = Arc::clone(&repo);
        let records = Arc::clone(&records);
        tasks.spawn(async move {
            let items = task
                .run(repo.as_ref())
                .await
                .with_context(|| format!("collecting {task} failed"))?;
            tracing::debug!(task = %task, records = items.len(), "Collection task done");
            records.add(items);
            Ok::<_, anyhow::Error>(())
        });
    }

    let mut first_error = None;
    while let Some(result) = tasks.join_next().await {
        let outcome = result.map_err(anyhow::Error::from).and_then(|r| r);
        if let Err(e) = outcome {
            tracing::error!(repo = %repo.identity(), "{:#}", e);
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    let batch = MetricsBatch::new(repo.identity().clone(), records.take());
    tracing::debug!(repo = %repo.identity(), records = batch.len(), "Retrieve: end");
    Ok(batch)
}
