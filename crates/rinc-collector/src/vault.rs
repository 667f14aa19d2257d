//! Reachability and seal status of a Vault server.

use crate::error::{CollectError, Result};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

pub const HEALTH_ENDPOINT: &str = "/v1/sys/health";

/// Answer 200 for standby, sealed and uninitialized servers too, so every
/// state arrives as a decodable body.
const HEALTH_QUERY: &[(&str, &str)] = &[
    ("standbyok", "true"),
    ("perfstandbyok", "true"),
    ("sealedcode", "200"),
    ("uninitcode", "200"),
];

/// `GET /v1/sys/health`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VaultHealth {
    pub initialized: bool,
    pub sealed: bool,
    pub standby: bool,
    pub version: String,
    pub cluster_name: String,
}

pub struct VaultClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl VaultClient {
    pub fn new(addr: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;
        Self::with_client(client, addr)
    }

    pub fn with_client(client: reqwest::Client, addr: &str) -> Result<Self> {
        let endpoint = Url::parse(addr)
            .and_then(|base| base.join(HEALTH_ENDPOINT))
            .map_err(|e| CollectError::Config(format!("vault addr {addr:?}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(CollectError::Config(format!(
                "vault addr {addr:?} must start with http:// or https://"
            )));
        }
        Ok(Self { client, endpoint })
    }

    pub async fn health(&self) -> Result<VaultHealth> {
        let resp = self
            .client
            .get(self.endpoint.clone())
            .query(HEALTH_QUERY)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(CollectError::HttpStatus {
                endpoint: self.endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}
