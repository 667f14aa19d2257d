/// How a job run ended when not every reporter succeeded.
///
/// # Examples
///
/// ```rust
/// use rinc_job::error::RunError;
///
/// let err = RunError::Incomplete {
///     kinds: vec!["longjobs", "ceph"],
/// };
/// assert_eq!(err.to_string(), "2 reports failed: longjobs, ceph");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The run deadline passed or a shutdown signal arrived while the
    /// reporter was running. Its in-flight work was dropped.
    #[error("{kind} report cancelled")]
    Cancelled { kind: &'static str },

    /// A reporter failed and the run stopped there.
    #[error("generating {kind} report: {source:#}")]
    Failed {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Reporters failed while the run continued past failures.
    #[error("{} reports failed: {}", .kinds.len(), .kinds.join(", "))]
    Incomplete { kinds: Vec<&'static str> },
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }
}
