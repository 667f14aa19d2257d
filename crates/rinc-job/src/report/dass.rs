use crate::config::DassConfig;
use crate::report::{persist, Reporter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rinc_collector::cluster::{ClusterApi, WorkloadSummary};
use rinc_collector::pagination::{collect_pages, PAGE_SIZE};
use rinc_common::collection;
use rinc_common::report::{DassMetrics, WorkloadStatus};
use rinc_storage::DocumentStore;
use std::sync::Arc;

/// Reports the replica status of every deployment and statefulset.
pub struct DassReporter {
    cluster: Arc<dyn ClusterApi>,
    store: Arc<dyn DocumentStore>,
    config: DassConfig,
}

impl DassReporter {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<dyn DocumentStore>,
        config: DassConfig,
    ) -> Self {
        Self {
            cluster,
            store,
            config,
        }
    }

    pub async fn collect(&self, now: DateTime<Utc>) -> Result<DassMetrics> {
        let cluster = &self.cluster;
        let namespace = self.config.namespace.as_str();

        let deployments = collect_pages(|cursor| async move {
            cluster.list_deployments(namespace, &cursor, PAGE_SIZE).await
        })
        .await
        .with_context(|| format!("listing deployments in namespace {namespace:?}"))?;
        let statefulsets = collect_pages(|cursor| async move {
            cluster.list_statefulsets(namespace, &cursor, PAGE_SIZE).await
        })
        .await
        .with_context(|| format!("listing statefulsets in namespace {namespace:?}"))?;

        Ok(DassMetrics {
            timestamp: now,
            deployments: deployments.into_iter().map(workload_status).collect(),
            statefulsets: statefulsets.into_iter().map(workload_status).collect(),
        })
    }
}

pub fn workload_status(w: WorkloadSummary) -> WorkloadStatus {
    let healthy = w.ready >= w.desired && w.updated >= w.desired && w.available >= w.desired;
    if !healthy {
        tracing::debug!(
            name = %w.name,
            namespace = %w.namespace,
            desired = w.desired,
            ready = w.ready,
            "workload not fully rolled out"
        );
    }
    WorkloadStatus {
        name: w.name,
        namespace: w.namespace,
        desired_replicas: w.desired,
        ready_replicas: w.ready,
        updated_replicas: w.updated,
        available_replicas: w.available,
        healthy,
    }
}

#[async_trait::async_trait]
impl Reporter for DassReporter {
    fn kind(&self) -> &'static str {
        collection::DASS
    }

    async fn report(&mut self, now: DateTime<Utc>) -> Result<()> {
        let metrics = self.collect(now).await?;
        persist(
            self.store.as_ref(),
            self.kind(),
            &self.config.alerts,
            now,
            &metrics,
        )?;
        Ok(())
    }
}
