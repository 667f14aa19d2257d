#![allow(dead_code)]

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rinc_collector::cluster::{
    ClusterApi, JobSummary, NodeCapacity, NodeUsageSample, WorkloadSummary,
};
use rinc_collector::error::{CollectError, Result};
use rinc_collector::pagination::Page;
use rinc_job::report::Reporter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory cluster that serves its listings `limit` items at a time, using
/// the offset of the next page as the continue token.
#[derive(Default)]
pub struct FakeCluster {
    pub jobs: Vec<JobSummary>,
    pub nodes: Vec<NodeCapacity>,
    pub node_metrics: Vec<NodeUsageSample>,
    pub deployments: Vec<WorkloadSummary>,
    pub statefulsets: Vec<WorkloadSummary>,
    /// Fail any listing asked for this cursor.
    pub fail_at_cursor: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeCluster {
    fn page<T: Clone>(&self, items: &[T], cursor: &str, limit: u32) -> Result<Page<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at_cursor.as_deref() == Some(cursor) {
            return Err(CollectError::Config(format!("listing failed at {cursor:?}")));
        }
        let start: usize = if cursor.is_empty() {
            0
        } else {
            cursor.parse().map_err(|_| CollectError::Config(cursor.to_string()))?
        };
        let end = (start + limit as usize).min(items.len());
        let next = if end < items.len() {
            end.to_string()
        } else {
            String::new()
        };
        Ok(Page::new(items[start..end].to_vec(), next))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_jobs(&self, namespace: &str, cursor: &str, limit: u32) -> Result<Page<JobSummary>> {
        let jobs: Vec<_> = self
            .jobs
            .iter()
            .filter(|j| namespace.is_empty() || j.namespace == namespace)
            .cloned()
            .collect();
        self.page(&jobs, cursor, limit)
    }

    async fn list_nodes(&self, cursor: &str, limit: u32) -> Result<Page<NodeCapacity>> {
        self.page(&self.nodes, cursor, limit)
    }

    async fn list_node_metrics(&self, cursor: &str, limit: u32) -> Result<Page<NodeUsageSample>> {
        self.page(&self.node_metrics, cursor, limit)
    }

    async fn list_deployments(
        &self,
        _namespace: &str,
        cursor: &str,
        limit: u32,
    ) -> Result<Page<WorkloadSummary>> {
        self.page(&self.deployments, cursor, limit)
    }

    async fn list_statefulsets(
        &self,
        _namespace: &str,
        cursor: &str,
        limit: u32,
    ) -> Result<Page<WorkloadSummary>> {
        self.page(&self.statefulsets, cursor, limit)
    }
}

pub fn job(name: &str, namespace: &str, created_at: DateTime<Utc>) -> JobSummary {
    JobSummary {
        name: name.into(),
        namespace: namespace.into(),
        created_at: Some(created_at),
        finished: false,
        suspended: false,
        active: 1,
        failed: 0,
        ready: 1,
    }
}

/// What a [`ScriptedReporter`] does when run.
#[derive(Clone, Copy)]
pub enum Script {
    Succeed,
    Fail,
    Hang,
}

/// Records its kind into a shared log when run, then follows its script.
pub struct ScriptedReporter {
    pub kind: &'static str,
    pub script: Script,
    pub log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Reporter for ScriptedReporter {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn report(&mut self, _now: DateTime<Utc>) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(self.kind);
        match self.script {
            Script::Succeed => Ok(()),
            Script::Fail => anyhow::bail!("{} exploded", self.kind),
            Script::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}
