//! Paged listings from the Kubernetes API server.
//!
//! [`ClusterApi`] is the seam reporters depend on; [`KubeClusterApi`] is the
//! live implementation backed by a [`kube::Client`]. Listing methods map the
//! API objects into the small summaries the reporters need.

use crate::error::Result;
use crate::pagination::Page;
use crate::quantity::parse_quantity;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Node, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, ObjectList};
use kube::Client;

/// The fields of a batch job the long-jobs report consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub name: String,
    pub namespace: String,
    pub created_at: Option<DateTime<Utc>>,
    /// A `Complete` or `Failed` condition is true.
    pub finished: bool,
    /// A `Suspended` condition is true.
    pub suspended: bool,
    pub active: i32,
    pub failed: i32,
    pub ready: i32,
}

/// Node capacity in cores and bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCapacity {
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
}

/// Node usage from `metrics.k8s.io`, in cores and bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUsageSample {
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
}

/// A deployment or statefulset with its container images and replica
/// counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkloadSummary {
    pub name: String,
    pub namespace: String,
    pub images: Vec<String>,
    /// `spec.replicas`, which the API server defaults to 1.
    pub desired: i32,
    pub ready: i32,
    pub updated: i32,
    pub available: i32,
}

/// Paged listings of cluster resources. An empty namespace lists across all
/// namespaces; an empty cursor starts from the first page.
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_jobs(&self, namespace: &str, cursor: &str, limit: u32) -> Result<Page<JobSummary>>;

    async fn list_nodes(&self, cursor: &str, limit: u32) -> Result<Page<NodeCapacity>>;

    async fn list_node_metrics(&self, cursor: &str, limit: u32) -> Result<Page<NodeUsageSample>>;

    async fn list_deployments(
        &self,
        namespace: &str,
        cursor: &str,
        limit: u32,
    ) -> Result<Page<WorkloadSummary>>;

    async fn list_statefulsets(
        &self,
        namespace: &str,
        cursor: &str,
        limit: u32,
    ) -> Result<Page<WorkloadSummary>>;
}

pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connects using the in-cluster service account or the local kubeconfig.
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn scoped<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }

    fn node_metrics_api(&self) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "NodeMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "nodes");
        Api::all_with(self.client.clone(), &resource)
    }
}

fn list_params(cursor: &str, limit: u32) -> ListParams {
    let params = ListParams::default().limit(limit);
    if cursor.is_empty() {
        params
    } else {
        params.continue_token(cursor)
    }
}

/// Maps a listed page, carrying over its continue token.
fn into_page<K, T>(list: ObjectList<K>, f: impl Fn(K) -> Result<T>) -> Result<Page<T>>
where
    K: Clone,
{
    let next = list.metadata.continue_.unwrap_or_default();
    let items = list.items.into_iter().map(f).collect::<Result<Vec<_>>>()?;
    Ok(Page::new(items, next))
}

#[async_trait::async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_jobs(&self, namespace: &str, cursor: &str, limit: u32) -> Result<Page<JobSummary>> {
        let list = self
            .scoped::<Job>(namespace)
            .list(&list_params(cursor, limit))
            .await?;
        into_page(list, |job| Ok(job_summary(job)))
    }

    async fn list_nodes(&self, cursor: &str, limit: u32) -> Result<Page<NodeCapacity>> {
        let list = Api::<Node>::all(self.client.clone())
            .list(&list_params(cursor, limit))
            .await?;
        into_page(list, node_capacity)
    }

    async fn list_node_metrics(&self, cursor: &str, limit: u32) -> Result<Page<NodeUsageSample>> {
        let list = self
            .node_metrics_api()
            .list(&list_params(cursor, limit))
            .await?;
        into_page(list, node_usage)
    }

    async fn list_deployments(
        &self,
        namespace: &str,
        cursor: &str,
        limit: u32,
    ) -> Result<Page<WorkloadSummary>> {
        let list = self
            .scoped::<Deployment>(namespace)
            .list(&list_params(cursor, limit))
            .await?;
        into_page(list, |d| Ok(deployment_summary(d)))
    }

    async fn list_statefulsets(
        &self,
        namespace: &str,
        cursor: &str,
        limit: u32,
    ) -> Result<Page<WorkloadSummary>> {
        let list = self
            .scoped::<StatefulSet>(namespace)
            .list(&list_params(cursor, limit))
            .await?;
        into_page(list, |s| Ok(statefulset_summary(s)))
    }
}

/// Converts an API timestamp via its RFC 3339 wire form.
fn parse_k8s_time(time: &Time) -> Option<DateTime<Utc>> {
    let value = serde_json::to_value(time).ok()?;
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub fn job_summary(job: Job) -> JobSummary {
    let status = job.status.unwrap_or_default();
    let conditions = status.conditions.unwrap_or_default();
    let condition_true = |kinds: &[&str]| {
        conditions
            .iter()
            .any(|c| kinds.contains(&c.type_.as_str()) && c.status == "True")
    };

    JobSummary {
        created_at: job.metadata.creation_timestamp.as_ref().and_then(parse_k8s_time),
        name: job.metadata.name.unwrap_or_default(),
        namespace: job.metadata.namespace.unwrap_or_default(),
        finished: condition_true(&["Complete", "Failed"]),
        suspended: condition_true(&["Suspended"]),
        active: status.active.unwrap_or_default(),
        failed: status.failed.unwrap_or_default(),
        ready: status.ready.unwrap_or_default(),
    }
}

pub fn node_capacity(node: Node) -> Result<NodeCapacity> {
    let capacity = node
        .status
        .and_then(|s| s.capacity)
        .unwrap_or_default();
    let get = |key: &str| capacity.get(key).map_or(Ok(0.0), |q| parse_quantity(&q.0));

    Ok(NodeCapacity {
        cpu: get("cpu")?,
        memory: get("memory")?,
        name: node.metadata.name.unwrap_or_default(),
    })
}

pub fn node_usage(obj: DynamicObject) -> Result<NodeUsageSample> {
    let usage = &obj.data["usage"];
    let get = |key: &str| usage[key].as_str().map_or(Ok(0.0), parse_quantity);

    Ok(NodeUsageSample {
        cpu: get("cpu")?,
        memory: get("memory")?,
        name: obj.metadata.name.unwrap_or_default(),
    })
}

fn container_images(template: PodTemplateSpec) -> Vec<String> {
    template
        .spec
        .map(|spec| spec.containers.into_iter().filter_map(|c| c.image).collect())
        .unwrap_or_default()
}

pub fn deployment_summary(deployment: Deployment) -> WorkloadSummary {
    let status = deployment.status.unwrap_or_default();
    let spec = deployment.spec.unwrap_or_default();

    WorkloadSummary {
        name: deployment.metadata.name.unwrap_or_default(),
        namespace: deployment.metadata.namespace.unwrap_or_default(),
        desired: spec.replicas.unwrap_or(1),
        images: container_images(spec.template),
        ready: status.ready_replicas.unwrap_or_default(),
        updated: status.updated_replicas.unwrap_or_default(),
        available: status.available_replicas.unwrap_or_default(),
    }
}

pub fn statefulset_summary(statefulset: StatefulSet) -> WorkloadSummary {
    let status = statefulset.status.unwrap_or_default();
    let spec = statefulset.spec.unwrap_or_default();

    WorkloadSummary {
        name: statefulset.metadata.name.unwrap_or_default(),
        namespace: statefulset.metadata.namespace.unwrap_or_default(),
        desired: spec.replicas.unwrap_or(1),
        images: container_images(spec.template),
        ready: status.ready_replicas.unwrap_or_default(),
        updated: status.updated_replicas.unwrap_or_default(),
        available: status.available_replicas.unwrap_or_default(),
    }
}
