//! Incremental metrics derived from webhook events.
//!
//! Between two polling passes, pull request "closed" events are turned into a
//! `pull_requests.close_delay.<merged|not_merged>` record and sent on their own.

use crate::metrics::{MetricRecord, MetricsBatch};
use crate::store::Store;
use crate::types::RepositoryIdentity;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const MAX_REMEMBERED_DELIVERIES: u64 = 10_000;

#[derive(Debug, Deserialize)]
struct PartialPayload {
    action: String,
    pull_request: PartialPullRequest,
}

#[derive(Debug, Deserialize)]
struct PartialPullRequest {
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    merged: bool,
}

/// Builds the close-delay record for a pull request "closed" event.
///
/// Anything else, including payloads that cannot be parsed, yields `None`.
pub fn close_delay_record(payload: &[u8]) -> Option<MetricRecord> {
    let payload: PartialPayload = serde_json::from_slice(payload).ok()?;
    if payload.action != "closed" {
        return None;
    }

    let pr = payload.pull_request;
    let closed_at = pr.closed_at?;
    let outcome = if pr.merged { "merged" } else { "not_merged" };
    let hours = (closed_at - pr.created_at).num_hours();

    Some(MetricRecord::count(
        format!("pull_requests.close_delay.{outcome}"),
        hours,
    ))
}

pub struct EventHandler {
    origin: RepositoryIdentity,
    store: Arc<dyn Store>,
    /// Delivery ids already handled, so redelivered events are not counted twice.
    seen: Cache<String, ()>,
}

impl EventHandler {
    pub fn new(origin: RepositoryIdentity, store: Arc<dyn Store>, dedup_ttl: Duration) -> Self {
        let seen = Cache::builder()
            .max_capacity(MAX_REMEMBERED_DELIVERIES)
            .time_to_live(dedup_ttl)
            .build();

        Self {
            origin,
            store,
            seen,
        }
    }

    /// Handles one event. Returns whether a metric was sent.
    ///
    /// Store failures are logged; they never stop the consumer.
    pub async fn handle(&self, delivery_id: Option<&str>, payload: &[u8]) -> bool {
        tracing::debug!(delivery_id, "Queue event received");

        if let Some(id) = delivery_id {
            if self.seen.contains_key(id) {
                tracing::debug!(delivery_id = id, "Skipping redelivered event");
                return false;
            }
        }

        let Some(record) = close_delay_record(payload) else {
            return false;
        };

        let batch = MetricsBatch::single(self.origin.clone(), record);
        match self.store.send(&batch).await {
            Ok(()) => {
                // Ids are only remembered once sent; a redelivery retries a failed send.
                if let Some(id) = delivery_id {
                    self.seen.insert(id.to_string(), ()).await;
                }
                true
            }
            Err(e) => {
                tracing::error!(repo = %self.origin, "Failed to send event metric: {:#}", e);
                false
            }
        }
    }
}
