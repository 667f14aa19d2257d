/// Errors raised while collecting data from the cluster or the storage
/// dashboard. Any of them aborts the reporter invocation that hit it.
///
/// # Examples
///
/// ```rust
/// use rinc_collector::error::CollectError;
///
/// let err = CollectError::InsufficientPermissions {
///     username: "rinc".to_string(),
///     missing: vec!["rgw:read".to_string()],
/// };
/// assert!(err.to_string().contains("rgw:read"));
/// assert!(err.is_permission_error());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Non-2xx status from the dashboard API.
    #[error("{endpoint}: non-2xx status {status}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// An underlying HTTP transport error from `reqwest`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON deserialization failure of a response body.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Kubernetes API server or client error.
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    /// A resource quantity (`"250m"`, `"16Gi"`) that does not parse.
    #[error("invalid quantity {0:?}")]
    Quantity(String),

    /// The auth endpoint could not be reached or refused the credentials.
    #[error("fetching auth token: {0}")]
    AuthFetch(#[source] Box<CollectError>),

    /// The token was issued but lacks required `scope:permission` pairs.
    #[error("user {username:?} doesn't have sufficient permissions (missing {})", .missing.join(", "))]
    InsufficientPermissions {
        username: String,
        missing: Vec<String>,
    },

    /// The token's `exp` claim could not be decoded.
    #[error("validating auth token expiry: {0}")]
    TokenExpiry(#[from] jsonwebtoken::errors::Error),

    /// Client configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CollectError {
    pub fn is_permission_error(&self) -> bool {
        matches!(self, CollectError::InsufficientPermissions { .. })
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, CollectError>;
