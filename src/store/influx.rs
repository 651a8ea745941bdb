use super::Store;
use crate::metrics::{MetricValue, MetricsBatch};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};

#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub endpoint: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// InfluxDB v1 HTTP write API, line protocol with second precision.
#[derive(Debug, Clone)]
pub struct InfluxStore {
    config: InfluxConfig,
    client: reqwest::Client,
}

impl InfluxStore {
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent("octostats").build()?;
        Ok(Self { config, client })
    }

    fn write_url(&self) -> String {
        format!("{}/write", self.config.endpoint.trim_end_matches('/'))
    }

    /// One point per record, measurement `<owner>.<name>.<path>`.
    fn format(batch: &MetricsBatch, timestamp: i64) -> String {
        let prefix = batch.origin().nwo();
        let mut out = String::new();

        for record in batch.items() {
            if record.data().is_empty() {
                continue;
            }

            let fields: Vec<String> = record
                .data()
                .iter()
                .map(|(key, value)| format!("{}={}", escape_key(key), field_value(value)))
                .collect();

            let measurement = escape_measurement(&format!("{prefix}.{}", record.path()));
            out.push_str(&format!("{measurement} {} {timestamp}\n", fields.join(",")));
        }

        out
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_key(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

fn field_value(value: &MetricValue) -> String {
    match value {
        MetricValue::Int(v) => format!("{v}i"),
        MetricValue::Bool(v) => v.to_string(),
        MetricValue::Text(v) => format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

impl Store for InfluxStore {
    fn send<'a>(&'a self, batch: &'a MetricsBatch) -> BoxFuture<'a, Result<()>> {
        async move {
            let body = Self::format(batch, Utc::now().timestamp());
            if body.is_empty() {
                return Ok(());
            }

            let mut query = vec![("db", self.config.database.as_str()), ("precision", "s")];
            if let Some(username) = &self.config.username {
                query.push(("u", username.as_str()));
            }
            if let Some(password) = &self.config.password {
                query.push(("p", password.as_str()));
            }

            tracing::debug!(repo = %batch.origin(), records = batch.len(), "Saving metrics to influxdb");
            let response = self
                .client
                .post(self.write_url())
                .query(&query)
                .body(body)
                .send()
                .await
                .with_context(|| format!("failed to reach influxdb at {}", self.config.endpoint))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                bail!("influxdb write failed with {status}: {detail}");
            }
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRecord;
    use crate::types::RepositoryIdentity;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn batch() -> MetricsBatch {
        MetricsBatch::new(
            RepositoryIdentity::new("docker", "docker"),
            vec![
                MetricRecord::count("issues.open", 12_usize),
                MetricRecord::new(
                    "issues.data",
                    [
                        ("id", MetricValue::from(7_u64)),
                        ("state", MetricValue::from("open")),
                        ("time", MetricValue::from(1_700_000_000_i64)),
                    ],
                ),
                MetricRecord::new("labels.data", [("name", "say \"hi\", world")]),
            ],
        )
    }

    fn config(endpoint: String) -> InfluxConfig {
        InfluxConfig {
            endpoint,
            database: "octostats".to_string(),
            username: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
        }
    }

    #[test]
    fn test_format() {
        let out = InfluxStore::format(&batch(), 1_700_000_100);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "docker.docker.issues.open count=12i 1700000100",
                "docker.docker.issues.data id=7i,state=\"open\",time=1700000000i 1700000100",
                r#"docker.docker.labels.data name="say \"hi\", world" 1700000100"#,
            ]
        );
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_measurement("a b,c"), "a\\ b\\,c");
        assert_eq!(escape_key("a=b"), "a\\=b");
        assert_eq!(field_value(&MetricValue::Bool(false)), "false");
    }

    #[tokio::test]
    async fn test_send() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "octostats"))
            .and(query_param("u", "admin"))
            .and(query_param("p", "hunter2"))
            .and(body_string_contains("docker.docker.issues.open count=12i"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = InfluxStore::new(config(mock_server.uri())).unwrap();
        store.send(&batch()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/write"))
            .respond_with(ResponseTemplate::new(404).set_body_string("database not found"))
            .mount(&mock_server)
            .await;

        let store = InfluxStore::new(config(mock_server.uri())).unwrap();
        let err = store.send(&batch()).await.unwrap_err();
        assert!(err.to_string().contains("database not found"));
    }

    #[tokio::test]
    async fn test_send_empty_batch_skips_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&mock_server)
            .await;

        let store = InfluxStore::new(config(mock_server.uri())).unwrap();
        let empty = MetricsBatch::new(RepositoryIdentity::new("docker", "docker"), Vec::new());
        store.send(&empty).await.unwrap();
    }
}
