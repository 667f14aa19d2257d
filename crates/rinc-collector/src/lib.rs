//! Data collection for the reporters.
//!
//! - [`cluster`]: paged listings of jobs, nodes, node metrics and workloads
//!   from the Kubernetes API, behind the [`cluster::ClusterApi`] trait.
//! - [`ceph`]: the storage dashboard client and its token lifecycle.
//! - [`pagination`]: cursor-following collection shared by the listings.
//! - [`quantity`]: resource quantity parsing and percentages.
//! - [`vault`]: Vault health for the connectivity report.

pub mod ceph;
pub mod cluster;
pub mod error;
pub mod pagination;
pub mod quantity;
pub mod vault;

pub use error::{CollectError, Result};
