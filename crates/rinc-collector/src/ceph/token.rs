//! Bearer tokens for the storage dashboard API.
//!
//! [`TokenManager`] owns one cached token. It fetches lazily on first use,
//! re-fetches once the token has expired, and checks the granted permissions
//! after every fetch. A token lacking a required permission is rejected
//! before any request is sent with it.

use crate::ceph::api::MEDIA_TYPE_V1_0;
use crate::error::{CollectError, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Granted or required permissions: scope to permission names.
pub type Permissions = BTreeMap<String, Vec<String>>;

/// Response body of `POST /api/auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub permissions: Permissions,
}

/// A fetched token with its decoded expiry.
#[derive(Clone)]
pub struct AuthToken {
    pub token: String,
    pub permissions: Permissions,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

impl AuthToken {
    /// Builds a token from the auth response, reading `expires_at` from the
    /// JWT `exp` claim. The signature is not verified.
    pub fn from_response(resp: AuthResponse) -> Result<Self> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<ExpiryClaim>(
            &resp.token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )?;
        let expires_at = DateTime::from_timestamp(data.claims.exp, 0)
            .ok_or_else(|| CollectError::Config(format!("token exp {} out of range", data.claims.exp)))?;

        Ok(Self {
            token: resp.token,
            permissions: resp.permissions,
            expires_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Required `scope:permission` pairs this token was not granted.
    pub fn missing_permissions(&self, required: &Permissions) -> Vec<String> {
        required
            .iter()
            .flat_map(|(scope, perms)| perms.iter().map(move |p| (scope, p)))
            .filter(|(scope, perm)| {
                !self
                    .permissions
                    .get(*scope)
                    .is_some_and(|granted| granted.contains(*perm))
            })
            .map(|(scope, perm)| format!("{scope}:{perm}"))
            .collect()
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("permissions", &self.permissions)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where tokens come from.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// The account the tokens are issued to, for error messages.
    fn username(&self) -> &str;

    async fn fetch(&self) -> Result<AuthToken>;
}

/// Exchanges a username and password at `POST {url}/api/auth`.
pub struct PasswordTokenSource {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

impl PasswordTokenSource {
    pub fn new(client: reqwest::Client, base_url: &str, username: &str, password: &str) -> Self {
        Self {
            client,
            url: format!("{}/api/auth", base_url.trim_end_matches('/')),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    async fn request(&self) -> Result<AuthToken> {
        let resp = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, MEDIA_TYPE_V1_0)
            .json(&Credentials {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(CollectError::HttpStatus {
                endpoint: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }
        AuthToken::from_response(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl TokenSource for PasswordTokenSource {
    fn username(&self) -> &str {
        &self.username
    }

    async fn fetch(&self) -> Result<AuthToken> {
        self.request()
            .await
            .map_err(|e| CollectError::AuthFetch(Box::new(e)))
    }
}

/// Caches one token from `S` and validates it against the required
/// permissions.
///
/// A permission failure is latched: once a fetched token has been rejected,
/// every later call fails the same way without contacting the source again.
pub struct TokenManager<S> {
    source: S,
    required: Permissions,
    token: Option<AuthToken>,
    denied: Option<Vec<String>>,
    refreshes: u64,
}

impl<S: TokenSource> TokenManager<S> {
    pub fn new(source: S, required: Permissions) -> Self {
        Self {
            source,
            required,
            token: None,
            denied: None,
            refreshes: 0,
        }
    }

    /// Returns a bearer token valid at `now`, fetching or refreshing it first
    /// when needed.
    ///
    /// # Errors
    ///
    /// [`CollectError::AuthFetch`] when fetching fails; an expired token stays
    /// cached and the next call tries the refresh again.
    /// [`CollectError::InsufficientPermissions`] when the fetched token lacks
    /// a required permission, and on every call after that.
    pub async fn bearer(&mut self, now: DateTime<Utc>) -> Result<String> {
        if let Some(missing) = &self.denied {
            return Err(self.permission_error(missing.clone()));
        }
        if let Some(token) = &self.token {
            if !token.is_expired(now) {
                return Ok(token.token.clone());
            }
            tracing::debug!(expired_at = %token.expires_at, "refreshing dashboard token");
        }

        let token = self.source.fetch().await?;
        let missing = token.missing_permissions(&self.required);
        if !missing.is_empty() {
            tracing::error!(
                username = %self.source.username(),
                missing = ?missing,
                "dashboard user lacks required permissions"
            );
            self.token = None;
            self.denied = Some(missing.clone());
            return Err(self.permission_error(missing));
        }

        if self.token.is_some() {
            self.refreshes += 1;
        }
        let bearer = token.token.clone();
        self.token = Some(token);
        Ok(bearer)
    }

    fn permission_error(&self, missing: Vec<String>) -> CollectError {
        CollectError::InsufficientPermissions {
            username: self.source.username().to_string(),
            missing,
        }
    }

    /// How many times an expired token has been replaced.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Whether the source's credentials were rejected for missing permissions.
    pub fn is_denied(&self) -> bool {
        self.denied.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn perms(pairs: &[(&str, &[&str])]) -> Permissions {
        pairs
            .iter()
            .map(|(scope, p)| (scope.to_string(), p.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    /// Hands out tokens expiring at the queued instants. Fetches numbered
    /// `fail_from` and later fail.
    struct FakeSource {
        fetches: Arc<AtomicUsize>,
        expiries: Vec<DateTime<Utc>>,
        granted: Permissions,
        fail_from: usize,
    }

    #[async_trait::async_trait]
    impl TokenSource for FakeSource {
        fn username(&self) -> &str {
            "rinc"
        }

        async fn fetch(&self) -> Result<AuthToken> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_from {
                return Err(CollectError::AuthFetch(Box::new(CollectError::Config(
                    "auth endpoint unavailable".into(),
                ))));
            }
            let expires_at = self.expiries[n.min(self.expiries.len() - 1)];
            Ok(AuthToken {
                token: format!("token-{n}"),
                permissions: self.granted.clone(),
                expires_at,
            })
        }
    }

    fn manager(
        expiries: Vec<DateTime<Utc>>,
        granted: Permissions,
        required: Permissions,
    ) -> (TokenManager<FakeSource>, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = FakeSource {
            fetches: Arc::clone(&fetches),
            expiries,
            granted,
            fail_from: usize::MAX,
        };
        (TokenManager::new(source, required), fetches)
    }

    #[tokio::test]
    async fn fetches_lazily_and_reuses_valid_token() {
        let now = Utc::now();
        let read = perms(&[("osd", &["read"])]);
        let (mut tm, fetches) = manager(vec![now + Duration::hours(8)], read.clone(), read);

        assert!(!tm.has_token());
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert_eq!(tm.bearer(now).await.unwrap(), "token-0");
        assert_eq!(tm.bearer(now + Duration::hours(1)).await.unwrap(), "token-0");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(tm.refreshes(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_exactly_once() {
        let now = Utc::now();
        let read = perms(&[("osd", &["read"])]);
        let (mut tm, fetches) = manager(
            vec![now - Duration::minutes(1), now + Duration::hours(8)],
            read.clone(),
            read,
        );

        // First fetch hands out an already expired token.
        assert_eq!(tm.bearer(now - Duration::hours(1)).await.unwrap(), "token-0");
        assert_eq!(tm.bearer(now).await.unwrap(), "token-1");
        assert_eq!(tm.bearer(now).await.unwrap(), "token-1");
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(tm.refreshes(), 1);
    }

    #[tokio::test]
    async fn missing_scope_is_a_permission_error() {
        let now = Utc::now();
        let (mut tm, _) = manager(
            vec![now + Duration::hours(8)],
            perms(&[("osd", &["read"]), ("pool", &["create"])]),
            perms(&[("osd", &["read"]), ("pool", &["read"]), ("rgw", &["read"])]),
        );

        match tm.bearer(now).await {
            Err(CollectError::InsufficientPermissions { username, missing }) => {
                assert_eq!(username, "rinc");
                assert_eq!(missing, ["pool:read", "rgw:read"]);
            }
            other => panic!("expected permission error, got {other:?}"),
        }
        assert!(!tm.has_token());
    }

    #[tokio::test]
    async fn rejected_credentials_are_not_fetched_again() {
        let now = Utc::now();
        let (mut tm, fetches) = manager(
            vec![now + Duration::hours(8)],
            Permissions::new(),
            perms(&[("osd", &["read"])]),
        );

        for minutes in 0..3 {
            let err = tm.bearer(now + Duration::minutes(minutes)).await.unwrap_err();
            assert!(err.is_permission_error(), "{err}");
            assert!(err.to_string().contains("osd:read"));
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(tm.is_denied());
        assert!(!tm.has_token());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_expired_token_and_retries() {
        let now = Utc::now();
        let read = perms(&[("osd", &["read"])]);
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = FakeSource {
            fetches: Arc::clone(&fetches),
            expiries: vec![now + Duration::minutes(5)],
            granted: read.clone(),
            fail_from: 1,
        };
        let mut tm = TokenManager::new(source, read);

        assert_eq!(tm.bearer(now).await.unwrap(), "token-0");
        let later = now + Duration::minutes(10);
        assert!(matches!(tm.bearer(later).await, Err(CollectError::AuthFetch(_))));
        assert!(tm.has_token());
        assert!(!tm.is_denied());
        assert!(matches!(tm.bearer(later).await, Err(CollectError::AuthFetch(_))));
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        assert_eq!(tm.refreshes(), 0);
    }

    #[test]
    fn expiry_comes_from_jwt_exp_claim() {
        #[derive(Serialize)]
        struct Claims {
            exp: i64,
            username: &'static str,
        }
        let token = jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                exp: 1_714_521_600,
                username: "rinc",
            },
            &EncodingKey::from_secret(b"dashboard-secret"),
        )
        .unwrap();

        let resp: AuthResponse = serde_json::from_value(serde_json::json!({
            "token": token,
            "username": "rinc",
            "permissions": {"osd": ["read", "update"]},
        }))
        .unwrap();
        let parsed = AuthToken::from_response(resp).unwrap();
        assert_eq!(parsed.expires_at.timestamp(), 1_714_521_600);
        assert!(parsed.is_expired(parsed.expires_at));
        assert!(parsed.missing_permissions(&perms(&[("osd", &["read"])])).is_empty());
    }

    #[test]
    fn undecodable_token_is_an_error() {
        let resp = AuthResponse {
            token: "not-a-jwt".into(),
            username: String::new(),
            permissions: Permissions::new(),
        };
        assert!(matches!(
            AuthToken::from_response(resp),
            Err(CollectError::TokenExpiry(_))
        ));
    }
}
