use super::Store;
use crate::metrics::{MetricValue, MetricsBatch};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Graphite plaintext protocol over TCP, one connection per batch.
#[derive(Debug, Clone)]
pub struct GraphiteStore {
    endpoint: String,
}

impl GraphiteStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// One `<path> <value> <timestamp>` line per numeric field.
    ///
    /// The `count` field is written under the record's own path, other fields get their
    /// name appended. Text fields have no graphite representation and are skipped.
    fn format(batch: &MetricsBatch, timestamp: i64) -> String {
        let prefix = batch.origin().nwo();
        let mut out = String::new();

        for record in batch.items() {
            for (field, value) in record.data() {
                let value = match value {
                    MetricValue::Int(v) => *v,
                    MetricValue::Bool(v) => i64::from(*v),
                    MetricValue::Text(_) => continue,
                };

                let name = if field == "count" {
                    format!("{prefix}.{}", record.path())
                } else {
                    format!("{prefix}.{}.{field}", record.path())
                };
                out.push_str(&format!("{name} {value} {timestamp}\n"));
            }
        }

        out
    }
}

impl Store for GraphiteStore {
    fn send<'a>(&'a self, batch: &'a MetricsBatch) -> BoxFuture<'a, Result<()>> {
        async move {
            let payload = Self::format(batch, Utc::now().timestamp());
            if payload.is_empty() {
                return Ok(());
            }

            let mut stream = TcpStream::connect(&self.endpoint)
                .await
                .with_context(|| format!("failed to connect to graphite at {}", self.endpoint))?;
            stream.write_all(payload.as_bytes()).await?;
            stream.shutdown().await?;

            tracing::debug!(endpoint = %self.endpoint, records = batch.len(), "Sent metrics to graphite");
            Ok(())
        }
        .boxed()
    }
}
