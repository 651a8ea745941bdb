use super::Store;
use crate::metrics::MetricsBatch;
use anyhow::Result;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use std::io::Write;

/// Prints every record to stdout. Useful to inspect what a backend would receive.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleStore;

impl ConsoleStore {
    fn format(batch: &MetricsBatch, timestamp: i64) -> Result<String> {
        let prefix = batch.origin().nwo();
        let mut out = String::new();
        for record in batch.items() {
            let data = serde_json::to_string(record.data())?;
            out.push_str(&format!("{prefix}.{} {data} {timestamp}\n", record.path()));
        }
        Ok(out)
    }
}

impl Store for ConsoleStore {
    fn send<'a>(&'a self, batch: &'a MetricsBatch) -> BoxFuture<'a, Result<()>> {
        async move {
            let payload = Self::format(batch, Utc::now().timestamp())?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(payload.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
        .boxed()
    }
}
