mod common;

use chrono::Utc;
use common::http::vault;
use rinc_collector::vault::VaultClient;
use rinc_common::collection;
use rinc_job::config::Config;
use rinc_job::report::{ConnectivityReporter, Reporter};
use rinc_storage::{DocumentStore, MemoryDocumentStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r#"
    [connectivity]
    enable = true

    [[connectivity.alerts]]
    when = "vault == nil || !vault.connected"
    message = "vault is unreachable"
    severity = "critical"

    [[connectivity.alerts]]
    when = "vault != nil && vault.sealed"
    message = "vault {{.Vault.ClusterName}} is sealed"
    severity = "warning"
"#;

fn vault_client(addr: &str) -> VaultClient {
    let http = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    VaultClient::with_client(http, addr).unwrap()
}

#[tokio::test]
async fn records_sealed_vault_and_store() {
    let server = vault(json!({
        "initialized": true,
        "sealed": true,
        "standby": false,
        "version": "1.15.2",
        "cluster_name": "vault-cluster-1",
    }))
    .await;
    let store = Arc::new(MemoryDocumentStore::new());
    let config = Config::parse(CONFIG).unwrap();
    let mut reporter = ConnectivityReporter::with_vault(
        Some(vault_client(&server.url)),
        store.clone(),
        config.connectivity,
    );

    reporter.report(Utc::now()).await.unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.path, "/v1/sys/health");
    assert!(request.query.contains("sealedcode=200"));

    let doc = &store.all(collection::CONNECTIVITY)[0].body;
    assert_eq!(
        doc["vault"],
        json!({
            "connected": true,
            "initialized": true,
            "sealed": true,
            "version": "1.15.2",
            "clusterName": "vault-cluster-1",
        })
    );
    assert_eq!(doc["database"]["connected"], true);

    let alerts = &store.all(collection::ALERTS)[0].body;
    assert_eq!(alerts["sourceKind"], "connectivity");
    assert_eq!(
        alerts["alerts"],
        json!([{"message": "vault vault-cluster-1 is sealed", "severity": "warning"}])
    );
}

#[tokio::test]
async fn unreachable_vault_is_data_not_an_error() {
    let store = Arc::new(MemoryDocumentStore::new());
    let config = Config::parse(CONFIG).unwrap();
    // Nothing listens on the discard port.
    let mut reporter = ConnectivityReporter::with_vault(
        Some(vault_client("http://127.0.0.1:9")),
        store.clone(),
        config.connectivity,
    );

    reporter.report(Utc::now()).await.unwrap();

    let doc = &store.all(collection::CONNECTIVITY)[0].body;
    assert_eq!(doc["vault"]["connected"], false);
    assert_eq!(doc["vault"]["version"], "");
    let alerts = &store.all(collection::ALERTS)[0].body;
    assert_eq!(
        alerts["alerts"],
        json!([{"message": "vault is unreachable", "severity": "critical"}])
    );
}

#[tokio::test]
async fn disabled_vault_check_leaves_vault_null() {
    let store = Arc::new(MemoryDocumentStore::new());
    let config = Config::parse(CONFIG).unwrap();
    let mut reporter = ConnectivityReporter::new(store.clone(), config.connectivity).unwrap();

    reporter.report(Utc::now()).await.unwrap();

    assert_eq!(store.count(collection::CONNECTIVITY).unwrap(), 1);
    let doc = &store.all(collection::CONNECTIVITY)[0].body;
    assert!(doc["vault"].is_null());
    assert_eq!(doc["database"]["connected"], true);
}
