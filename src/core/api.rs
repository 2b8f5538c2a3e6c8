// src/core/api.rs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, ConfigError};
use crate::core::auth::Authenticator;
use crate::core::error::CollectError;
use crate::core::models::Module;

/// Production API host.
pub const DEFAULT_API_URL: &str = "https://api.app.cymulate.com/";

const API_VERSION: &str = "v1";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const RETRY_BACKOFF: Duration = Duration::from_millis(750);

// --- Endpoint ---

pub fn environments_path() -> String {
    format!("{API_VERSION}/environments")
}

pub fn agents_path() -> String {
    format!("{API_VERSION}/agents/get-all")
}

pub fn history_path(module: Module) -> String {
    format!("{API_VERSION}/{module}/history/get-ids")
}

pub fn report_path(module: Module, assessment_id: &str) -> String {
    format!("{API_VERSION}/{module}/history/{}/{assessment_id}", module.report_variant())
}

/// Anything that can answer a GET with a JSON document.
///
/// The pipeline only talks to the platform through this trait, so the whole
/// collection can run against an in-memory source.
#[async_trait]
pub trait ApiSource: Send + Sync {
    /// Fetches `path` (relative to the API root) with the given query
    /// parameters and decodes the body as JSON.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, CollectError>;
}

/// The reqwest-backed client for the Cymulate REST API.
pub struct CymulateClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Authenticator,
    retry_once: bool,
}

impl CymulateClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            auth: config.auth.clone(),
            retry_once: config.retry_once,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CollectError> {
        Ok(self.base_url.join(path)?)
    }

    async fn fetch_once(&self, url: &Url, query: &[(&str, String)]) -> Result<Value, CollectError> {
        debug!(url = %url, "Sending request.");
        let response = self
            .http
            .get(url.clone())
            .headers(self.auth.headers())
            .query(query)
            .send()
            .await
            .map_err(|source| CollectError::Http { url: url.to_string(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::Status { url: url.to_string(), status });
        }

        let body = response
            .text()
            .await
            .map_err(|source| CollectError::Http { url: url.to_string(), source })?;
        debug!(url = %url, bytes = body.len(), "Received response body.");
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ApiSource for CymulateClient {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, CollectError> {
        let url = self.endpoint(path)?;
        match self.fetch_once(&url, query).await {
            Err(e) if self.retry_once && e.is_transient() => {
                warn!(url = %url, error = %e, "Request failed, retrying once.");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.fetch_once(&url, query).await
            }
            result => result,
        }
    }
}
