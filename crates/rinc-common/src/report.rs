//! Metrics documents, one per report kind.
//!
//! Field names and nesting are read back by the report viewer, so they are
//! serialized in camelCase and must stay stable. Durations are whole seconds.

use crate::types::duration_secs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Jobs that have been running longer than the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongJobsMetrics {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub older_than: Duration,
    pub jobs: Vec<LongJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongJob {
    pub name: String,
    pub namespace: String,
    pub suspended: bool,
    pub active_pods: i32,
    pub failed_pods: i32,
    pub ready_pods: i32,
    #[serde(with = "duration_secs")]
    pub age: Duration,
}

/// Node resource utilization in percent of capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    pub timestamp: DateTime<Utc>,
    pub nodes: Vec<NodeUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub name: String,
    pub cpu: f64,
    pub mem: f64,
}

/// Container images referenced by deployments and statefulsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTagMetrics {
    pub timestamp: DateTime<Utc>,
    pub deployments: Vec<WorkloadImages>,
    pub statefulsets: Vec<WorkloadImages>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadImages {
    pub name: String,
    pub namespace: String,
    pub images: Vec<String>,
}

/// Rollout status of deployments and statefulsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DassMetrics {
    pub timestamp: DateTime<Utc>,
    pub deployments: Vec<WorkloadStatus>,
    pub statefulsets: Vec<WorkloadStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    pub name: String,
    pub namespace: String,
    pub desired_replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,
    pub available_replicas: i32,
    /// Every desired replica is ready, updated and available.
    pub healthy: bool,
}

/// Whether the job's dependencies answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityMetrics {
    pub timestamp: DateTime<Utc>,
    /// Absent when the Vault check is disabled.
    pub vault: Option<VaultStatus>,
    pub database: DatabaseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub connected: bool,
    pub initialized: bool,
    pub sealed: bool,
    pub version: String,
    pub cluster_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    pub connected: bool,
}

/// Storage cluster health, host inventory and bucket usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CephMetrics {
    pub timestamp: DateTime<Utc>,
    pub status: CephStatus,
    pub hosts: Vec<CephHost>,
    pub buckets: Vec<CephBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CephStatus {
    /// `HEALTH_OK`, `HEALTH_WARN` or `HEALTH_ERR`.
    pub health: String,
    pub checks: Vec<CephHealthCheck>,
    pub monitors: usize,
    pub osds: usize,
    pub osds_up: usize,
    pub osds_in: usize,
    pub pools: usize,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub used_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CephHealthCheck {
    pub name: String,
    pub severity: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CephHost {
    pub hostname: String,
    /// Service type to number of daemons of that type on the host.
    pub services: BTreeMap<String, usize>,
    pub devices: usize,
    pub available_devices: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CephBucket {
    pub bucket: String,
    pub owner: String,
    pub size_bytes: u64,
    pub objects: u64,
}
