use crate::config::LongJobsConfig;
use crate::report::{persist, Reporter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rinc_collector::cluster::{ClusterApi, JobSummary};
use rinc_collector::pagination::{collect_pages, PAGE_SIZE};
use rinc_common::collection;
use rinc_common::report::{LongJob, LongJobsMetrics};
use rinc_storage::DocumentStore;
use std::sync::Arc;

/// Reports unfinished jobs created more than `older_than` ago.
pub struct LongJobsReporter {
    cluster: Arc<dyn ClusterApi>,
    store: Arc<dyn DocumentStore>,
    config: LongJobsConfig,
}

impl LongJobsReporter {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<dyn DocumentStore>,
        config: LongJobsConfig,
    ) -> Self {
        Self {
            cluster,
            store,
            config,
        }
    }

    pub async fn collect(&self, now: DateTime<Utc>) -> Result<LongJobsMetrics> {
        let older_than = chrono::Duration::from_std(self.config.older_than)
            .context("older_than is out of range")?;
        let threshold = now - older_than;

        let cluster = &self.cluster;
        let namespace = self.config.namespace.as_str();
        let jobs = collect_pages(|cursor| async move {
            cluster.list_jobs(namespace, &cursor, PAGE_SIZE).await
        })
        .await
        .with_context(|| format!("listing jobs in namespace {namespace:?}"))?;

        let jobs: Vec<LongJob> = jobs
            .into_iter()
            .filter_map(|job| self.long_job(job, now, threshold))
            .collect();
        tracing::info!(long_jobs = jobs.len(), "all jobs diagnosed successfully");

        Ok(LongJobsMetrics {
            timestamp: now,
            older_than: self.config.older_than,
            jobs,
        })
    }

    fn long_job(
        &self,
        job: JobSummary,
        now: DateTime<Utc>,
        threshold: DateTime<Utc>,
    ) -> Option<LongJob> {
        if job.finished {
            return None;
        }
        if job.suspended && !self.config.include_suspended {
            tracing::debug!(name = %job.name, namespace = %job.namespace, "skipping suspended job");
            return None;
        }
        let created_at = job.created_at?;
        if created_at >= threshold {
            return None;
        }

        let age = (now - created_at).to_std().unwrap_or_default();
        tracing::debug!(name = %job.name, namespace = %job.namespace, age_secs = age.as_secs(), "long running job");
        Some(LongJob {
            name: job.name,
            namespace: job.namespace,
            suspended: job.suspended,
            active_pods: job.active,
            failed_pods: job.failed,
            ready_pods: job.ready,
            age,
        })
    }
}

#[async_trait::async_trait]
impl Reporter for LongJobsReporter {
    fn kind(&self) -> &'static str {
        collection::LONG_JOBS
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
