use anyhow::{Context, Result};
use rinc_alert::AlertRule;
use rinc_collector::ceph::DashboardApiConfig;
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration of the reporting job, loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub long_jobs: LongJobsConfig,
    #[serde(default)]
    pub resource_utilization: ResourceConfig,
    #[serde(default)]
    pub image_tag: ImageTagConfig,
    #[serde(default)]
    pub dass: DassConfig,
    #[serde(default)]
    pub ceph: CephConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// An `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// What a run does when a reporter fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterErrorPolicy {
    /// Stop at the first failing reporter.
    #[default]
    Abort,
    /// Log the failure and run the remaining reporters.
    Continue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub on_reporter_error: ReporterErrorPolicy,
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Seconds between runs; 0 runs once and exits.
    #[serde(default)]
    pub interval_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            on_reporter_error: ReporterErrorPolicy::default(),
            run_timeout_secs: default_run_timeout_secs(),
            interval_secs: 0,
        }
    }
}

impl JobConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub alerts: Vec<AlertRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub enable: bool,
    /// E.g. `http://vault.vault.svc.cluster.local:8200`.
    #[serde(default)]
    pub addr: String,
    #[serde(default = "default_vault_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            enable: false,
            addr: String::new(),
            timeout_secs: default_vault_timeout_secs(),
        }
    }
}

impl VaultConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LongJobsConfig {
    #[serde(default)]
    pub enable: bool,
    /// Empty lists jobs in every namespace.
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_older_than", with = "humantime_serde")]
    pub older_than: Duration,
    #[serde(default)]
    pub include_suspended: bool,
    #[serde(default)]
    pub alerts: Vec<AlertRule>,
}

impl Default for LongJobsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            namespace: String::new(),
            older_than: default_older_than(),
            include_suspended: false,
            alerts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub alerts: Vec<AlertRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageTagConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub alerts: Vec<AlertRule>,
}

/// Deployment and statefulset status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DassConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub alerts: Vec<AlertRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CephConfig {
    #[serde(default)]
    pub enable: bool,
    pub dashboard_api: Option<DashboardApiConfig>,
    #[serde(default)]
    pub alerts: Vec<AlertRule>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_path() -> String {
    "data/rinc.db".to_string()
}

fn default_run_timeout_secs() -> u64 {
    600
}

fn default_vault_timeout_secs() -> u64 {
    5
}

fn default_older_than() -> Duration {
    Duration::from_secs(24 * 3600)
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path:?}"))?;
        Self::parse(&content).with_context(|| format!("loading config file {path:?}"))
    }

    /// Parses and validates a TOML document. Alert rules compile here, so a
    /// bad expression or template fails the whole load.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.job.run_timeout_secs == 0 {
            anyhow::bail!("job.run_timeout_secs must be greater than 0");
        }
        if self.connectivity.vault.enable && self.connectivity.vault.addr.trim().is_empty() {
            anyhow::bail!("connectivity.vault is enabled but connectivity.vault.addr is empty");
        }
        if self.ceph.enable && self.ceph.dashboard_api.is_none() {
            anyhow::bail!("ceph is enabled but [ceph.dashboard_api] is missing");
        }
        Ok(())
    }

    /// Whether any enabled reporter reads from the Kubernetes API.
    pub fn needs_cluster(&self) -> bool {
        self.long_jobs.enable
            || self.resource_utilization.enable
            || self.image_tag.enable
            || self.dass.enable
    }
}
