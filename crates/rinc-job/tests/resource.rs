mod common;

use chrono::Utc;
use common::FakeCluster;
use rinc_collector::cluster::{NodeCapacity, NodeUsageSample};
use rinc_common::collection;
use rinc_job::config::Config;
use rinc_job::report::{Reporter, ResourceReporter};
use rinc_storage::MemoryDocumentStore;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn nodes_without_metrics_are_left_out() {
    let cluster = Arc::new(FakeCluster {
        nodes: vec![
            NodeCapacity {
                name: "n1".into(),
                cpu: 4.0,
                memory: 1000.0,
            },
            NodeCapacity {
                name: "n2".into(),
                cpu: 4.0,
                memory: 1000.0,
            },
        ],
        node_metrics: vec![NodeUsageSample {
            name: "n1".into(),
            cpu: 3.0,
            memory: 500.0,
        }],
        ..Default::default()
    });
    let config = Config::parse(
        r#"
        [resource_utilization]
        enable = true
        [[resource_utilization.alerts]]
        when = "max(pluck(nodes, 'cpu')) > 70"
        message = "{{range .Nodes}}{{.Name}} cpu {{printf \"%.0f\" .Cpu}}%{{end}}"
        severity = "critical"
        "#,
    )
    .unwrap();
    let store = Arc::new(MemoryDocumentStore::new());

    let mut reporter = ResourceReporter::new(cluster, store.clone(), config.resource_utilization);
    reporter.report(Utc::now()).await.unwrap();

    let doc = &store.all(collection::RESOURCE)[0].body;
    assert_eq!(doc["nodes"], json!([{"name": "n1", "cpu": 75.0, "mem": 50.0}]));

    let alerts = &store.all(collection::ALERTS)[0].body;
    assert_eq!(
        alerts["alerts"],
        json!([{"message": "n1 cpu 75%", "severity": "critical"}])
    );
}
