//! Send items to the catalog ingestion API or write them to disk.

use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::{Result, StacError};
use crate::item::Item;

pub const DEFAULT_TOKEN_URL: &str = "http://dev.ghg.center/ghgcenter/api/publish/token";
pub const DEFAULT_INGEST_URL: &str = "http://dev.ghg.center/ghgcenter/api/publish/ingestions";

#[derive(Clone)]
pub struct PublisherConfig {
    pub token_url: String,
    pub ingest_url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for PublisherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherConfig")
            .field("token_url", &self.token_url)
            .field("ingest_url", &self.ingest_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl PublisherConfig {
    /// Credentials from `STAC_INGEST_USERNAME` / `STAC_INGEST_PASSWORD`;
    /// endpoints from `STAC_TOKEN_URL` / `STAC_INGEST_URL` when set.
    pub fn from_env() -> Result<Self> {
        let var = |name: &'static str| std::env::var(name).map_err(|_| StacError::MissingEnv(name));
        Ok(Self {
            token_url: std::env::var("STAC_TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            ingest_url: std::env::var("STAC_INGEST_URL")
                .unwrap_or_else(|_| DEFAULT_INGEST_URL.to_string()),
            username: var("STAC_INGEST_USERNAME")?,
            password: var("STAC_INGEST_PASSWORD")?,
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "AccessToken")]
    access_token: Option<String>,
}

/// Result of one ingestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub id: String,
    pub status: u16,
}

pub struct StacPublisher {
    client: Client,
    config: PublisherConfig,
}

impl StacPublisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Exchange credentials for a bearer token.
    #[instrument(skip(self), fields(url = %self.config.token_url))]
    pub async fn token(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StacError::Auth(format!(
                "token endpoint returned {}; check the username and password",
                response.status()
            )));
        }

        let body: TokenResponse = response.json().await?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StacError::Auth("response has no AccessToken".to_string()))
    }

    /// POST one item with an existing token.
    pub async fn publish_with(&self, token: &str, item: &Item) -> Result<PublishOutcome> {
        let response = self
            .client
            .post(&self.config.ingest_url)
            .bearer_auth(token)
            .json(item)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StacError::Ingest {
                id: item.id.clone(),
                status: status.as_u16(),
                body,
            });
        }

        info!(id = %item.id, status = status.as_u16(), "Published item");
        Ok(PublishOutcome {
            id: item.id.clone(),
            status: status.as_u16(),
        })
    }

    /// Fetch one token and publish every item, stopping at the first
    /// rejected item.
    pub async fn publish_all(&self, items: &[Item]) -> Result<Vec<PublishOutcome>> {
        let token = self.token().await?;
        debug!(items = items.len(), "Obtained ingestion token");

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(self.publish_with(&token, item).await?);
        }
        Ok(outcomes)
    }
}

/// Write each item as `<dir>/<id>.json`.
pub async fn write_items(dir: impl AsRef<Path>, items: &[Item]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let mut written = Vec::with_capacity(items.len());
    for item in items {
        let path = dir.join(format!("{}.json", item.id));
        tokio::fs::write(&path, serde_json::to_vec_pretty(item)?).await?;
        written.push(path);
    }
    debug!(dir = %dir.display(), count = written.len(), "Wrote item files");
    Ok(written)
}
