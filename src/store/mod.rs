//! Outbound metrics backends.
//!
//! The backend is chosen once from the configuration; everything downstream only sees
//! the [`Store`] capability.

use crate::config::{AppConfig, Output};
use crate::metrics::MetricsBatch;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::sync::Arc;

mod console;
mod graphite;
mod influx;

pub use console::ConsoleStore;
pub use graphite::GraphiteStore;
pub use influx::{InfluxConfig, InfluxStore};

pub trait Store: Send + Sync {
    fn send<'a>(&'a self, batch: &'a MetricsBatch) -> BoxFuture<'a, Result<()>>;
}

pub fn build_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.output {
        Output::Console => Arc::new(ConsoleStore),
        Output::Graphite => {
            let endpoint = config
                .graphite_endpoint
                .clone()
                .context("GRAPHITE_ENDPOINT is required for the graphite output")?;
            Arc::new(GraphiteStore::new(endpoint))
        }
        Output::Influxdb => {
            let influx = InfluxConfig {
                endpoint: config
                    .influxdb_endpoint
                    .clone()
                    .context("INFLUXDB_ENDPOINT is required for the influxdb output")?,
                database: config
                    .influxdb_database
                    .clone()
                    .context("INFLUXDB_DATABASE is required for the influxdb output")?,
                username: config.influxdb_username.clone(),
                password: config.influxdb_password.clone(),
            };
            Arc::new(InfluxStore::new(influx)?)
        }
    };

    tracing::info!(output = ?config.output, "Metrics store configured");
    Ok(store)
}
