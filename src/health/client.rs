// src/health/client.rs
use super::response::{FetchError, HealthResponse};
use crate::config::ApiConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Anything the poller can ask for a health payload.
#[async_trait]
pub trait HealthSource: Send + Sync + 'static {
    async fn fetch_health(&self) -> Result<HealthResponse, FetchError>;
}

/// Issues `GET {origin}{base_path}/health` and decodes the JSON body.
///
/// No retries and no timeout beyond what reqwest does by default.
#[derive(Debug, Clone)]
pub struct HealthClient {
    client: Client,
    endpoint: Url,
}

impl HealthClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, health_endpoint(config)?))
    }

    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl HealthSource for HealthClient {
    async fn fetch_health(&self) -> Result<HealthResponse, FetchError> {
        debug!("GET {}", self.endpoint);

        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

/// Resolve the health endpoint against the configured origin.
pub fn health_endpoint(config: &ApiConfig) -> Result<Url> {
    let origin = Url::parse(&config.origin)
        .with_context(|| format!("Invalid API origin: {}", config.origin))?;
    let path = format!("{}/health", config.base_path.trim_end_matches('/'));

    origin
        .join(&path)
        .with_context(|| format!("Invalid API base path: {}", config.base_path))
}
