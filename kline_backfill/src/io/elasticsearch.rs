//! Upserts into an Elasticsearch index over its REST API.
//!
//! Each document goes to `PUT {url}/{index}/_doc/{id}`, which indexes a new
//! document or replaces the existing one with that id.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    config::SinkConfig,
    io::sink::{
        ClientBuildSnafu, DocumentSink, InvalidUrlSnafu, RejectedSnafu, RequestSnafu, SinkError,
        UpsertOutcome,
    },
    models::document::Document,
};

pub struct ElasticsearchSink {
    client: Client,
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<SecretString>,
}

/// The part of the index response we read.
#[derive(Debug, Deserialize)]
struct IndexResponse {
    result: Option<String>,
}

/// Outcome reported by a 2xx index response body.
fn index_outcome(body: &str) -> UpsertOutcome {
    match serde_json::from_str::<IndexResponse>(body) {
        Ok(IndexResponse { result: Some(r) }) if r == "created" => UpsertOutcome::Created,
        Ok(IndexResponse { result: Some(r) }) if r == "updated" => UpsertOutcome::Updated,
        _ => UpsertOutcome::Acknowledged,
    }
}

impl ElasticsearchSink {
    pub fn new(url: &str, index: &str, timeout: Duration) -> Result<Self, SinkError> {
        let parsed = Url::parse(url.trim()).ok().filter(|u| matches!(u.scheme(), "http" | "https"));
        if parsed.is_none() || index.trim().is_empty() {
            return InvalidUrlSnafu {
                url: format!("{url} (index {index:?})"),
            }
            .fail();
        }
        let client = Client::builder().timeout(timeout).build().context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: url.trim().trim_end_matches('/').to_string(),
            index: index.trim().to_string(),
            username: None,
            password: None,
        })
    }

    /// Basic auth on every request. The password may be absent.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<SecretString>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    pub fn from_config(config: &SinkConfig) -> Result<Self, SinkError> {
        let sink = Self::new(&config.url, &config.index, Duration::from_secs(config.timeout_secs))?;
        Ok(match &config.username {
            Some(username) => {
                let password = config
                    .password
                    .as_ref()
                    .map(|p| SecretString::from(p.expose_secret().to_owned()));
                sink.with_basic_auth(username.clone(), password)
            }
            None => sink,
        })
    }

    pub fn document_url(&self, id: &str) -> String {
        format!("{}/{}/_doc/{}", self.base_url, self.index, id)
    }
}

#[async_trait]
impl DocumentSink for ElasticsearchSink {
    async fn upsert(&self, document: &Document) -> Result<UpsertOutcome, SinkError> {
        let mut request = self.client.put(self.document_url(&document.id)).json(&document.body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref().map(|p| p.expose_secret()));
        }

        let response = request.send().await.context(RequestSnafu { id: &document.id })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return RejectedSnafu {
                id: &document.id,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        // the write already happened, an unreadable body only loses the detail
        let outcome = index_outcome(&response.text().await.unwrap_or_default());
        debug!(id = %document.id, ?outcome, "upserted");
        Ok(outcome)
    }
}
