//! The reporting job: loads configuration, runs the enabled reporters in a
//! fixed order and persists their metrics and alert documents.

pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod report;

pub use job::Job;
