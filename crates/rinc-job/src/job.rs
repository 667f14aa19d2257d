use crate::config::{Config, ReporterErrorPolicy};
use crate::error::RunError;
use crate::report::{
    CephReporter, ConnectivityReporter, DassReporter, ImageTagReporter, LongJobsReporter, Reporter,
    ResourceReporter,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rinc_collector::ceph::DashboardClient;
use rinc_collector::cluster::{ClusterApi, KubeClusterApi};
use rinc_storage::DocumentStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs the enabled reporters one after another in a fixed order.
pub struct Job {
    reporters: Vec<Box<dyn Reporter>>,
    policy: ReporterErrorPolicy,
}

impl Job {
    pub fn new(policy: ReporterErrorPolicy) -> Self {
        Self {
            reporters: Vec::new(),
            policy,
        }
    }

    /// Appends a reporter; reporters run in the order they were added.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    /// Builds the reporters enabled in `config`: connectivity, long jobs,
    /// resource utilization, image tags, workload status, then the storage
    /// cluster.
    pub async fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let mut job = Self::new(config.job.on_reporter_error);

        if config.connectivity.enable {
            job = job.with_reporter(ConnectivityReporter::new(
                store.clone(),
                config.connectivity.clone(),
            )?);
        }

        if config.needs_cluster() {
            let cluster: Arc<dyn ClusterApi> = Arc::new(
                KubeClusterApi::try_default()
                    .await
                    .context("connecting to the kubernetes api")?,
            );
            if config.long_jobs.enable {
                job = job.with_reporter(LongJobsReporter::new(
                    cluster.clone(),
                    store.clone(),
                    config.long_jobs.clone(),
                ));
            }
            if config.resource_utilization.enable {
                job = job.with_reporter(ResourceReporter::new(
                    cluster.clone(),
                    store.clone(),
                    config.resource_utilization.clone(),
                ));
            }
            if config.image_tag.enable {
                job = job.with_reporter(ImageTagReporter::new(
                    cluster.clone(),
                    store.clone(),
                    config.image_tag.clone(),
                ));
            }
            if config.dass.enable {
                job = job.with_reporter(DassReporter::new(
                    cluster,
                    store.clone(),
                    config.dass.clone(),
                ));
            }
        }

        if config.ceph.enable {
            let api = config
                .ceph
                .dashboard_api
                .as_ref()
                .context("ceph is enabled but [ceph.dashboard_api] is missing")?;
            let client = DashboardClient::new(api).context("building dashboard client")?;
            job = job.with_reporter(CephReporter::new(client, store, config.ceph.alerts.clone()));
        }

        tracing::info!(reporters = ?job.kinds(), policy = ?job.policy, "job configured");
        Ok(job)
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.reporters.iter().map(|r| r.kind()).collect()
    }

    /// Runs every reporter for the instant `now`.
    ///
    /// Each reporter races `cancel`; when it fires the reporter's in-flight
    /// work is dropped and the run ends with [`RunError::Cancelled`].
    pub async fn generate_all(
        &mut self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), RunError> {
        let mut failed = Vec::new();

        for reporter in &mut self.reporters {
            let kind = reporter.kind();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::error!(kind, timestamp = %now, "report cancelled");
                    return Err(RunError::Cancelled { kind });
                }
                result = reporter.report(now) => result,
            };

            match result {
                Ok(()) => tracing::info!(kind, timestamp = %now, "generated report"),
                Err(e) => {
                    tracing::error!(kind, error = %format!("{e:#}"), "generating report");
                    match self.policy {
                        ReporterErrorPolicy::Abort => {
                            return Err(RunError::Failed { kind, source: e });
                        }
                        ReporterErrorPolicy::Continue => failed.push(kind),
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(RunError::Incomplete { kinds: failed })
        }
    }

    /// One run bounded by `timeout`. The deadline and `shutdown` feed the
    /// same cancellation token.
    pub async fn run(
        &mut self,
        timeout: Duration,
        shutdown: &CancellationToken,
    ) -> std::result::Result<(), RunError> {
        let cancel = shutdown.child_token();
        let deadline = cancel.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!(timeout_secs = timeout.as_secs(), "run deadline exceeded");
            deadline.cancel();
        });

        let result = self.generate_all(Utc::now(), &cancel).await;
        timer.abort();
        result
    }
}
