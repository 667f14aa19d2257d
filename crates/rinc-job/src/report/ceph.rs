use crate::report::{persist, Reporter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rinc_alert::AlertRule;
use rinc_collector::ceph::api::{BucketEntry, HealthFull, HostEntry, HostInventory};
use rinc_collector::ceph::{DashboardClient, PasswordTokenSource, TokenSource};
use rinc_collector::pagination::PAGE_SIZE;
use rinc_collector::quantity::percentage;
use rinc_common::collection;
use rinc_common::report::{CephBucket, CephHealthCheck, CephHost, CephMetrics, CephStatus};
use rinc_storage::DocumentStore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reports storage cluster health, hosts and buckets from the dashboard API.
pub struct CephReporter<S = PasswordTokenSource> {
    client: DashboardClient<S>,
    store: Arc<dyn DocumentStore>,
    alerts: Vec<AlertRule>,
}

impl<S: TokenSource> CephReporter<S> {
    pub fn new(
        client: DashboardClient<S>,
        store: Arc<dyn DocumentStore>,
        alerts: Vec<AlertRule>,
    ) -> Self {
        Self {
            client,
            store,
            alerts,
        }
    }

    pub async fn collect(&mut self, now: DateTime<Utc>) -> Result<CephMetrics> {
        let health = self.client.health().await.context("fetching cluster health")?;
        let entries = self.client.hosts(PAGE_SIZE).await.context("listing hosts")?;

        let mut hosts = Vec::with_capacity(entries.len());
        for entry in entries {
            let inventory = self
                .client
                .host_inventory(&entry.hostname)
                .await
                .with_context(|| format!("fetching inventory of host {:?}", entry.hostname))?;
            hosts.push(ceph_host(entry, &inventory));
        }

        let buckets = self.client.buckets().await.context("listing buckets")?;
        let refreshes = self.client.tokens().await.refreshes();
        tracing::debug!(refreshes, "dashboard token refreshes");

        Ok(CephMetrics {
            timestamp: now,
            status: ceph_status(&health),
            hosts,
            buckets: buckets.iter().map(ceph_bucket).collect(),
        })
    }
}

#[async_trait::async_trait]
impl<S: TokenSource> Reporter for CephReporter<S> {
    fn kind(&self) -> &'static str {
        collection::CEPH
    }

    async fn report(&mut self, now: DateTime<Utc>) -> Result<()> {
        let metrics = self.collect(now).await?;
        persist(self.store.as_ref(), self.kind(), &self.alerts, now, &metrics)?;
        Ok(())
    }
}

pub fn ceph_status(health: &HealthFull) -> CephStatus {
    let osds = &health.osd_map.osds;
    let stats = &health.df.stats;
    CephStatus {
        health: health.health.status.clone(),
        checks: health
            .health
            .checks
            .iter()
            .map(|c| CephHealthCheck {
                name: c.kind.clone(),
                severity: c.severity.clone(),
                summary: c.summary.message.clone(),
            })
            .collect(),
        monitors: health.mon_status.monmap.mons.len(),
        osds: osds.len(),
        osds_up: osds.iter().filter(|o| o.up == 1).count(),
        osds_in: osds.iter().filter(|o| o.in_ == 1).count(),
        pools: health.pools.len(),
        total_bytes: stats.total_bytes,
        used_bytes: stats.total_used_raw_bytes,
        used_pct: percentage(stats.total_used_raw_bytes as f64, stats.total_bytes as f64),
    }
}

pub fn ceph_host(entry: HostEntry, inventory: &HostInventory) -> CephHost {
    let mut services = BTreeMap::new();
    for service in &entry.services {
        *services.entry(service.kind.clone()).or_insert(0) += 1;
    }
    CephHost {
        hostname: entry.hostname,
        services,
        devices: inventory.devices.len(),
        available_devices: inventory.devices.iter().filter(|d| d.available).count(),
    }
}

pub fn ceph_bucket(bucket: &BucketEntry) -> CephBucket {
    CephBucket {
        bucket: bucket.bucket.clone(),
        owner: bucket.owner.clone(),
        size_bytes: bucket.size_bytes(),
        objects: bucket.objects(),
    }
}
