//! Alert rules evaluated against metrics documents.
//!
//! A rule pairs a boolean [`expr::Expr`] with a message [`template::Template`]
//! and a severity. Both are compiled when configuration loads; evaluation runs
//! them against the serialized metrics document of a report and yields
//! [`rinc_common::types::FiredAlert`]s. A rule that fails at evaluation time is
//! skipped on its own without affecting the other rules.

pub mod engine;
pub mod error;
pub mod expr;
pub mod functions;
pub mod rule;
pub mod template;
pub mod value;


pub use engine::evaluate_all;
pub use rule::AlertRule;
