//! HTTP fakes served from a local port: the storage dashboard and Vault.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rinc_collector::ceph::{AuthToken, DashboardClient, Permissions, TokenSource};
use rinc_collector::error::{CollectError, Result};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the fake dashboard serves.
#[derive(Default)]
pub struct Dashboard {
    pub hosts: Vec<String>,
    /// Send `X-Total-Count` with host pages.
    pub total_header: bool,
    /// Serve the first host page whatever offset is asked for.
    pub ignore_offset: bool,
    /// Answer 500 to the inventory of this host.
    pub failing_inventory: Option<String>,
}

/// One request as received; `path` is still percent-encoded.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: String,
    pub authorization: String,
}

/// Status line, extra header lines and JSON body for a path and query.
pub type Response = (&'static str, String, String);

type Handler = dyn Fn(&str, &str) -> Response + Send + Sync;

pub struct FakeServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    server: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start(handler: impl Fn(&str, &str) -> Response + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let log = Arc::clone(&requests);
        let server = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let _ = serve(stream, handler.as_ref(), &log).await;
                });
            }
        });

        Self {
            url,
            requests,
            server,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    /// Queries of the host list requests, in order.
    pub fn host_pages(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == "/api/host")
            .map(|r| r.query)
            .collect()
    }

    pub fn inventories(&self) -> Vec<String> {
        self.paths()
            .into_iter()
            .filter(|p| p.ends_with("/inventory"))
            .collect()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn serve(stream: TcpStream, handler: &Handler, log: &Mutex<Vec<Recorded>>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();

    let mut authorization = String::new();
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("authorization") {
                authorization = value.trim().to_string();
            }
        }
    }

    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    log.lock().unwrap().push(Recorded {
        path: path.to_string(),
        query: query.to_string(),
        authorization,
    });

    let (status, extra, body) = handler(path, query);
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{extra}\r\n{body}",
        body.len()
    );
    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn query_param(query: &str, key: &str) -> Option<usize> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.parse().ok())
}

impl Dashboard {
    pub async fn serve(self) -> FakeServer {
        FakeServer::start(move |path, query| self.respond(path, query)).await
    }

    fn respond(&self, path: &str, query: &str) -> Response {
        const OK: &str = "200 OK";

        if path == "/api/health/full" {
            let body = json!({
                "health": {"status": "HEALTH_WARN", "checks": [{
                    "type": "OSD_DOWN",
                    "severity": "HEALTH_WARN",
                    "summary": {"message": "1 osds down", "count": 1},
                }]},
                "mon_status": {"monmap": {"mons": [{"name": "a"}, {"name": "b"}, {"name": "c"}]}},
                "osd_map": {"osds": [{"osd": 0, "up": 1, "in": 1}, {"osd": 1, "up": 0, "in": 1}]},
                "pools": [{"pool": 1}],
                "df": {"stats": {"total_bytes": 1000, "total_used_raw_bytes": 900}},
            });
            return (OK, String::new(), body.to_string());
        }

        if path == "/api/host" {
            let limit = query_param(query, "limit").unwrap_or(self.hosts.len());
            let offset = if self.ignore_offset {
                0
            } else {
                query_param(query, "offset").unwrap_or(0)
            };
            let page: Vec<_> = self
                .hosts
                .iter()
                .skip(offset)
                .take(limit)
                .map(|h| json!({"hostname": h, "services": [{"type": "osd", "id": 0}]}))
                .collect();
            let extra = if self.total_header {
                format!("x-total-count: {}\r\n", self.hosts.len())
            } else {
                String::new()
            };
            return (OK, extra, json!(page).to_string());
        }

        if let Some(host) = path
            .strip_prefix("/api/host/")
            .and_then(|rest| rest.strip_suffix("/inventory"))
        {
            if self.failing_inventory.as_deref() == Some(host) {
                let body = json!({"detail": "orchestrator unavailable"});
                return ("500 Internal Server Error", String::new(), body.to_string());
            }
            let body = json!({
                "name": host,
                "devices": [
                    {"path": "/dev/sda", "available": false},
                    {"path": "/dev/sdb", "available": true},
                ],
            });
            return (OK, String::new(), body.to_string());
        }

        if path == "/api/rgw/bucket" {
            let body = json!([{
                "bucket": "logs",
                "owner": "ops",
                "usage": {"rgw.main": {"size_actual": 2048, "num_objects": 2}},
            }]);
            return (OK, String::new(), body.to_string());
        }

        ("404 Not Found", String::new(), "{}".to_string())
    }
}

/// A Vault answering `/v1/sys/health` with `health`.
pub async fn vault(health: serde_json::Value) -> FakeServer {
    let body = health.to_string();
    FakeServer::start(move |path, _| {
        if path == "/v1/sys/health" {
            ("200 OK", String::new(), body.clone())
        } else {
            ("404 Not Found", String::new(), "{}".to_string())
        }
    })
    .await
}

pub fn read_all() -> Permissions {
    ["hosts", "monitor", "osd", "pool", "rgw"]
        .into_iter()
        .map(|scope| (scope.to_string(), vec!["read".to_string()]))
        .collect()
}

/// Issues tokens `token-0`, `token-1`, ... granting `granted`, expiring at
/// the queued instants; the last one repeats.
pub struct QueuedTokens {
    pub expiries: Vec<DateTime<Utc>>,
    pub granted: Permissions,
    pub fetches: Arc<AtomicUsize>,
}

impl QueuedTokens {
    pub fn valid_for_hours(hours: i64) -> Self {
        Self {
            expiries: vec![Utc::now() + Duration::hours(hours)],
            granted: read_all(),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fetches(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetches)
    }
}

#[async_trait]
impl TokenSource for QueuedTokens {
    fn username(&self) -> &str {
        "monitoring"
    }

    async fn fetch(&self) -> Result<AuthToken> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        let expires_at = *self
            .expiries
            .get(n)
            .or(self.expiries.last())
            .ok_or_else(|| CollectError::Config("no token queued".into()))?;
        Ok(AuthToken {
            token: format!("token-{n}"),
            permissions: self.granted.clone(),
            expires_at,
        })
    }
}

pub fn client(url: &str, tokens: QueuedTokens) -> DashboardClient<QueuedTokens> {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    DashboardClient::with_token_source(http, url, tokens, read_all()).unwrap()
}
