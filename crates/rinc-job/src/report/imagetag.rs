use crate::config::ImageTagConfig;
use crate::report::{persist, Reporter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rinc_collector::cluster::{ClusterApi, WorkloadSummary};
use rinc_collector::pagination::{collect_pages, PAGE_SIZE};
use rinc_common::collection;
use rinc_common::report::{ImageTagMetrics, WorkloadImages};
use rinc_storage::DocumentStore;
use std::sync::Arc;

/// Reports the container images of every deployment and statefulset.
pub struct ImageTagReporter {
    cluster: Arc<dyn ClusterApi>,
    store: Arc<dyn DocumentStore>,
    config: ImageTagConfig,
}

impl ImageTagReporter {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<dyn DocumentStore>,
        config: ImageTagConfig,
    ) -> Self {
        Self {
            cluster,
            store,
            config,
        }
    }

    pub async fn collect(&self, now: DateTime<Utc>) -> Result<ImageTagMetrics> {
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

        Ok(ImageTagMetrics {
            timestamp: now,
            deployments: deployments.into_iter().map(workload_images).collect(),
            statefulsets: statefulsets.into_iter().map(workload_images).collect(),
        })
    }
}

fn workload_images(w: WorkloadSummary) -> WorkloadImages {
    WorkloadImages {
        name: w.name,
        namespace: w.namespace,
        images: w.images,
    }
}

#[async_trait::async_trait]
impl Reporter for ImageTagReporter {
    fn kind(&self) -> &'static str {
        collection::IMAGE_TAG
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
