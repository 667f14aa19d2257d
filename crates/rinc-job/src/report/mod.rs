//! Reporters: each one collects one kind of metrics document, stores it, and
//! stores the alerts its rules fire against it.

pub mod ceph;
pub mod connectivity;
pub mod dass;
pub mod imagetag;
pub mod longjobs;
pub mod resource;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rinc_alert::{evaluate_all, AlertRule};
use rinc_common::collection;
use rinc_common::types::{AlertRecord, FiredAlert};
use rinc_storage::DocumentStore;
use serde::Serialize;

pub use ceph::CephReporter;
pub use connectivity::ConnectivityReporter;
pub use dass::DassReporter;
pub use imagetag::ImageTagReporter;
pub use longjobs::LongJobsReporter;
pub use resource::ResourceReporter;

/// One kind of report.
#[async_trait::async_trait]
pub trait Reporter: Send {
    /// Collection the report is stored in; also its `sourceKind` in alerts.
    fn kind(&self) -> &'static str;

    /// Collects, stores and alerts on one report taken at `now`.
    async fn report(&mut self, now: DateTime<Utc>) -> Result<()>;
}

/// Stores `doc` under `kind`, evaluates `rules` against its serialized form
/// and stores the resulting alert record, even when nothing fired.
///
/// Does not await, so a cancelled run never leaves a report without its
/// alert record.
pub fn persist<T: Serialize>(
    store: &dyn DocumentStore,
    kind: &'static str,
    rules: &[AlertRule],
    timestamp: DateTime<Utc>,
    doc: &T,
) -> Result<Vec<FiredAlert>> {
    let value = serde_json::to_value(doc).with_context(|| format!("serializing {kind} report"))?;
    let id = store
        .insert(kind, &value)
        .with_context(|| format!("inserting {kind} report"))?;
    tracing::debug!(inserted_id = %id, kind, "inserted report");

    let alerts = evaluate_all(rules, &value);
    let record = AlertRecord {
        timestamp,
        source_kind: kind.to_string(),
        alerts,
    };
    let id = store
        .insert(collection::ALERTS, &serde_json::to_value(&record)?)
        .with_context(|| format!("inserting {kind} alerts"))?;
    tracing::debug!(inserted_id = %id, kind, fired = record.alerts.len(), "inserted alerts");

    Ok(record.alerts)
}
