use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// Treat a token as expired this long before its reported expiry so in-flight
/// requests never race the real cutoff.
const EXPIRY_SKEW_SECS: i64 = 60;

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Access-token cache scoped to a single provider client instance. Tokens are
/// never shared across organizations.
#[derive(Default)]
pub struct TokenCache {
    inner: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token, unless it is within the skew window of expiry.
    pub async fn get(&self) -> Option<String> {
        let guard = self.inner.read().await;
        let cached = guard.as_ref()?;
        let cutoff = cached.expires_at - Duration::seconds(EXPIRY_SKEW_SECS);
        if Utc::now() < cutoff {
            Some(cached.access_token.clone())
        } else {
            None
        }
    }

    pub async fn store(&self, access_token: String, expires_in_secs: i64) {
        let mut guard = self.inner.write().await;
        *guard = Some(CachedToken {
            access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        });
    }
}
