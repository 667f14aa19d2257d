use crate::ceph::token::{PasswordTokenSource, Permissions, TokenManager, TokenSource};
use crate::error::{CollectError, Result};
use crate::pagination::{collect_pages, Page};
use chrono::Utc;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

pub const HEALTH_ENDPOINT: &str = "/api/health/full";
pub const HOST_LIST_ENDPOINT: &str = "/api/host";
pub const BUCKET_ENDPOINT: &str = "/api/rgw/bucket";

pub const MEDIA_TYPE_V1_0: &str = "application/vnd.ceph.api.v1.0+json";
pub const MEDIA_TYPE_V1_1: &str = "application/vnd.ceph.api.v1.1+json";
pub const MEDIA_TYPE_V1_2: &str = "application/vnd.ceph.api.v1.2+json";

const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Connection settings for the storage dashboard REST API.
#[derive(Clone, Deserialize)]
pub struct DashboardApiConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default = "default_required_permissions")]
    pub required_permissions: Permissions,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_required_permissions() -> Permissions {
    ["hosts", "monitor", "osd", "pool", "rgw"]
        .into_iter()
        .map(|scope| (scope.to_string(), vec!["read".to_string()]))
        .collect()
}

fn default_timeout_secs() -> u64 {
    30
}

impl std::fmt::Debug for DashboardApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardApiConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("required_permissions", &self.required_permissions)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ---- Response bodies ----

/// `GET /api/health/full`, reduced to the fields the report uses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealthFull {
    pub health: Health,
    pub mon_status: MonStatus,
    pub osd_map: OsdMap,
    pub pools: Vec<serde_json::Value>,
    pub df: Df,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Health {
    pub status: String,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub summary: HealthSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealthSummary {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonStatus {
    pub monmap: MonMap,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonMap {
    pub mons: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OsdMap {
    pub osds: Vec<OsdState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OsdState {
    pub osd: i64,
    pub up: u8,
    #[serde(rename = "in")]
    pub in_: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Df {
    pub stats: DfStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DfStats {
    pub total_bytes: u64,
    pub total_used_raw_bytes: u64,
    pub total_avail_bytes: u64,
}

/// One entry of `GET /api/host`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostEntry {
    pub hostname: String,
    pub services: Vec<HostService>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostService {
    #[serde(rename = "type")]
    pub kind: String,
    /// Daemon id; numeric for osds, a name for other services.
    pub id: serde_json::Value,
}

/// `GET /api/host/{hostname}/inventory`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostInventory {
    pub name: String,
    pub addr: String,
    pub devices: Vec<InventoryDevice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InventoryDevice {
    pub path: String,
    pub available: bool,
}

/// One entry of `GET /api/rgw/bucket?stats=true`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BucketEntry {
    pub bucket: String,
    pub owner: String,
    /// Usage per storage category (`rgw.main`, `rgw.multimeta`, ...).
    pub usage: BTreeMap<String, BucketUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BucketUsage {
    pub size_actual: u64,
    pub num_objects: u64,
}

impl BucketEntry {
    pub fn size_bytes(&self) -> u64 {
        self.usage.values().map(|u| u.size_actual).sum()
    }

    pub fn objects(&self) -> u64 {
        self.usage.values().map(|u| u.num_objects).sum()
    }
}

// ---- Client ----

/// Authenticated client for the storage dashboard REST API.
///
/// Every call obtains its bearer token from the owned [`TokenManager`], so
/// expiry and permission checks happen before any request is sent.
pub struct DashboardClient<S = PasswordTokenSource> {
    client: reqwest::Client,
    base_url: Url,
    tokens: Mutex<TokenManager<S>>,
}

impl DashboardClient<PasswordTokenSource> {
    pub fn new(config: &DashboardApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let source = PasswordTokenSource::new(
            client.clone(),
            &config.url,
            &config.username,
            &config.password,
        );
        Self::with_token_source(
            client,
            &config.url,
            source,
            config.required_permissions.clone(),
        )
    }
}

impl<S: TokenSource> DashboardClient<S> {
    pub fn with_token_source(
        client: reqwest::Client,
        base_url: &str,
        source: S,
        required: Permissions,
    ) -> Result<Self> {
        let invalid = || {
            CollectError::Config(format!(
                "dashboard url {base_url:?} must be an absolute http:// or https:// url"
            ))
        };
        let base_url = Url::parse(base_url).map_err(|_| invalid())?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(invalid());
        }
        Ok(Self {
            client,
            base_url,
            tokens: Mutex::new(TokenManager::new(source, required)),
        })
    }

    /// The token manager, locked for inspection.
    pub async fn tokens(&self) -> MutexGuard<'_, TokenManager<S>> {
        self.tokens.lock().await
    }

    /// The base url extended with `segments`, each percent-encoded as one
    /// path segment.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CollectError::Config(format!("dashboard url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.url(path.split('/').filter(|s| !s.is_empty()))
    }

    /// Authenticated `GET`; returns the decoded body and the response headers.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: Url,
        query: &[(&str, String)],
        media_type: &str,
    ) -> Result<(T, HeaderMap)> {
        let bearer = self.tokens.lock().await.bearer(Utc::now()).await?;

        let resp = self
            .client
            .get(endpoint.clone())
            .query(query)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(ACCEPT, media_type)
            .send()
            .await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await?;
        if !status.is_success() {
            tracing::error!(%endpoint, status = status.as_u16(), "dashboard api request failed");
            return Err(CollectError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok((serde_json::from_str(&body)?, headers))
    }

    pub async fn health(&self) -> Result<HealthFull> {
        let (health, _) = self
            .get(self.endpoint(HEALTH_ENDPOINT)?, &[], MEDIA_TYPE_V1_0)
            .await?;
        Ok(health)
    }

    /// Lists every host, `page_size` at a time. The cursor is the offset of
    /// the next page. Paging ends at the `X-Total-Count` reported by the
    /// server, at the first short page without one, or at a page that adds no
    /// host not already listed.
    pub async fn hosts(&self, page_size: u32) -> Result<Vec<HostEntry>> {
        let limit = page_size as usize;
        let seen = StdMutex::new(HashSet::new());
        let seen = &seen;

        collect_pages(|cursor| async move {
            let offset = parse_offset(&cursor)?;
            let query = [("limit", limit.to_string()), ("offset", offset.to_string())];
            let (page, headers): (Vec<HostEntry>, _) = self
                .get(self.endpoint(HOST_LIST_ENDPOINT)?, &query, MEDIA_TYPE_V1_2)
                .await?;

            let total = headers
                .get(TOTAL_COUNT_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            let received = page.len();
            let fresh: Vec<HostEntry> = {
                let mut seen = seen.lock().unwrap_or_else(PoisonError::into_inner);
                page.into_iter()
                    .filter(|h| seen.insert(h.hostname.clone()))
                    .collect()
            };
            tracing::debug!(offset, received, new = fresh.len(), "received storage hosts page");

            let next = offset + received;
            let done = received == 0
                || fresh.is_empty()
                || match total {
                    Some(total) => next >= total,
                    None => received < limit,
                };
            let cursor = if done { String::new() } else { next.to_string() };
            Ok::<_, CollectError>(Page::new(fresh, cursor))
        })
        .await
    }

    pub async fn host_inventory(&self, hostname: &str) -> Result<HostInventory> {
        let url = self.url(["api", "host", hostname, "inventory"])?;
        let (inventory, _) = self.get(url, &[], MEDIA_TYPE_V1_0).await?;
        Ok(inventory)
    }

    pub async fn buckets(&self) -> Result<Vec<BucketEntry>> {
        let query = [("stats", "true".to_string())];
        let (buckets, _) = self
            .get(self.endpoint(BUCKET_ENDPOINT)?, &query, MEDIA_TYPE_V1_1)
            .await?;
        Ok(buckets)
    }
}

fn parse_offset(cursor: &str) -> Result<usize> {
    if cursor.is_empty() {
        return Ok(0);
    }
    cursor
        .parse()
        .map_err(|_| CollectError::Config(format!("invalid host page offset {cursor:?}")))
}
