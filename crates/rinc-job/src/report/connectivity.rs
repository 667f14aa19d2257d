use crate::config::ConnectivityConfig;
use crate::report::{persist, Reporter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rinc_collector::vault::{VaultClient, VaultHealth};
use rinc_common::collection;
use rinc_common::report::{ConnectivityMetrics, DatabaseStatus, VaultStatus};
use rinc_storage::DocumentStore;
use std::sync::Arc;

/// Reports whether Vault and the document store answer. An unreachable
/// dependency is recorded in the document, not raised as an error.
pub struct ConnectivityReporter {
    vault: Option<VaultClient>,
    store: Arc<dyn DocumentStore>,
    config: ConnectivityConfig,
}

impl ConnectivityReporter {
    pub fn new(store: Arc<dyn DocumentStore>, config: ConnectivityConfig) -> Result<Self> {
        let vault = if config.vault.enable {
            Some(
                VaultClient::new(&config.vault.addr, config.vault.timeout())
                    .context("building vault client")?,
            )
        } else {
            None
        };
        Ok(Self::with_vault(vault, store, config))
    }

    pub fn with_vault(
        vault: Option<VaultClient>,
        store: Arc<dyn DocumentStore>,
        config: ConnectivityConfig,
    ) -> Self {
        Self {
            vault,
            store,
            config,
        }
    }

    pub async fn collect(&self, now: DateTime<Utc>) -> ConnectivityMetrics {
        let vault = match &self.vault {
            Some(client) => Some(match client.health().await {
                Ok(health) => vault_status(health),
                Err(e) => {
                    tracing::warn!(addr = %self.config.vault.addr, error = %e, "vault unreachable");
                    VaultStatus::default()
                }
            }),
            None => None,
        };

        let database = match self.store.ping() {
            Ok(()) => DatabaseStatus { connected: true },
            Err(e) => {
                tracing::warn!(error = %e, "document store unreachable");
                DatabaseStatus { connected: false }
            }
        };

        ConnectivityMetrics {
            timestamp: now,
            vault,
            database,
        }
    }
}

pub fn vault_status(health: VaultHealth) -> VaultStatus {
    VaultStatus {
        connected: true,
        initialized: health.initialized,
        sealed: health.sealed,
        version: health.version,
        cluster_name: health.cluster_name,
    }
}

#[async_trait::async_trait]
impl Reporter for ConnectivityReporter {
    fn kind(&self) -> &'static str {
        collection::CONNECTIVITY
    }

    async fn report(&mut self, now: DateTime<Utc>) -> Result<()> {
        let metrics = self.collect(now).await;
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
