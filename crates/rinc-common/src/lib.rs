//! Types shared by the alert engine, the collectors, the document store and
//! the reporting job.

pub mod report;
pub mod types;

/// Names of the document collections written by the reporting job.
pub mod collection {
    pub const ALERTS: &str = "alerts";
    pub const CONNECTIVITY: &str = "connectivity";
    pub const LONG_JOBS: &str = "longjobs";
    pub const RESOURCE: &str = "resource";
    pub const IMAGE_TAG: &str = "imagetag";
    pub const DASS: &str = "dass";
    pub const CEPH: &str = "ceph";
}
