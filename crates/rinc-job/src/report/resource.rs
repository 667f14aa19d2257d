use crate::config::ResourceConfig;
use crate::report::{persist, Reporter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rinc_collector::cluster::{ClusterApi, NodeCapacity, NodeUsageSample};
use rinc_collector::pagination::{collect_pages, PAGE_SIZE};
use rinc_collector::quantity::percentage;
use rinc_common::collection;
use rinc_common::report::{NodeUsage, ResourceMetrics};
use rinc_storage::DocumentStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Reports per-node cpu and memory usage as a percentage of capacity.
pub struct ResourceReporter {
    cluster: Arc<dyn ClusterApi>,
    store: Arc<dyn DocumentStore>,
    config: ResourceConfig,
}

impl ResourceReporter {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<dyn DocumentStore>,
        config: ResourceConfig,
    ) -> Self {
        Self {
            cluster,
            store,
            config,
        }
    }

    pub async fn collect(&self, now: DateTime<Utc>) -> Result<ResourceMetrics> {
        let cluster = &self.cluster;
        let usages = collect_pages(|cursor| async move {
            cluster.list_node_metrics(&cursor, PAGE_SIZE).await
        })
        .await
        .context("listing node metrics")?;
        let nodes = collect_pages(|cursor| async move { cluster.list_nodes(&cursor, PAGE_SIZE).await })
            .await
            .context("listing nodes")?;

        Ok(ResourceMetrics {
            timestamp: now,
            nodes: join_usage(&nodes, &usages),
        })
    }
}

/// Pairs each node with the usage sample of the same name. Nodes without a
/// sample are left out; samples without a node are ignored.
pub fn join_usage(nodes: &[NodeCapacity], usages: &[NodeUsageSample]) -> Vec<NodeUsage> {
    let by_name: HashMap<&str, &NodeUsageSample> =
        usages.iter().map(|u| (u.name.as_str(), u)).collect();

    nodes
        .iter()
        .filter_map(|node| {
            let Some(usage) = by_name.get(node.name.as_str()) else {
                tracing::debug!(node = %node.name, "no usage metrics for node");
                return None;
            };
            let util = NodeUsage {
                name: node.name.clone(),
                cpu: percentage(usage.cpu, node.cpu),
                mem: percentage(usage.memory, node.memory),
            };
            tracing::debug!(node = %util.name, cpu = util.cpu, mem = util.mem, "node utilization");
            Some(util)
        })
        .collect()
}

#[async_trait::async_trait]
impl Reporter for ResourceReporter {
    fn kind(&self) -> &'static str {
        collection::RESOURCE
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

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, cpu: f64, memory: f64) -> NodeCapacity {
        NodeCapacity {
            name: name.into(),
            cpu,
            memory,
        }
    }

    fn usage(name: &str, cpu: f64, memory: f64) -> NodeUsageSample {
        NodeUsageSample {
            name: name.into(),
            cpu,
            memory,
        }
    }

    #[test]
    fn joins_by_name_and_skips_unmatched() {
        let nodes = [node("n1", 4.0, 8.0), node("n2", 2.0, 4.0)];
        let usages = [usage("n1", 1.0, 2.0), usage("ghost", 1.0, 1.0)];

        let joined = join_usage(&nodes, &usages);
        assert_eq!(
            joined,
            [NodeUsage {
                name: "n1".into(),
                cpu: 25.0,
                mem: 25.0,
            }]
        );
    }

    #[test]
    fn each_node_gets_its_own_sample() {
        let nodes = [node("a", 10.0, 10.0), node("b", 10.0, 10.0)];
        let usages = [usage("b", 5.0, 1.0), usage("a", 1.0, 5.0)];

        let joined = join_usage(&nodes, &usages);
        assert_eq!((joined[0].cpu, joined[0].mem), (10.0, 50.0));
        assert_eq!((joined[1].cpu, joined[1].mem), (50.0, 10.0));
    }

    #[test]
    fn zero_capacity_reports_zero_percent() {
        let joined = join_usage(&[node("n1", 0.0, 0.0)], &[usage("n1", 1.0, 1.0)]);
        assert_eq!((joined[0].cpu, joined[0].mem), (0.0, 0.0));
    }
}
