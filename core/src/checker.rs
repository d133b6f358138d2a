//! Remote checker contract and its HTTP implementation.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CheckError;
use crate::Issue;

pub const DEFAULT_ENDPOINT: &str =
    "https://obsidian-orthography-api-mz8l64tz3-denisoed.vercel.app/check";

/// Response body of the check endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckResponse {
    pub alerts: Vec<Issue>,
}

/// Anything that can turn document text into a list of issues.
pub trait Checker: Send + Sync + 'static {
    fn check(&self, text: String) -> impl Future<Output = Result<Vec<Issue>, CheckError>> + Send;
}

/// `GET <endpoint>?text=<document>` against the grammar service.
#[derive(Debug, Clone)]
pub struct HttpChecker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChecker {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for HttpChecker {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl Checker for HttpChecker {
    async fn check(&self, text: String) -> Result<Vec<Issue>, CheckError> {
        debug!(endpoint = %self.endpoint, chars = text.len(), "requesting check");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("text", text.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CheckError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        let parsed: CheckResponse = serde_json::from_slice(&body)?;
        debug!(alerts = parsed.alerts.len(), "check answered");
        Ok(parsed.alerts)
    }
}
