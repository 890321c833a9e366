use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Bearer token shared by every gateway call of one client. Owned by whoever builds
/// the client, so tests can seed or inspect it.
///
/// Two callers racing on an empty cache both fetch a token; the later store wins and
/// both tokens stay valid.
#[derive(Debug)]
pub struct TokenCache {
    token: RwLock<Option<CachedToken>>,
    safety_margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}

impl TokenCache {
    pub fn new(safety_margin: Duration) -> Self {
        Self {
            token: RwLock::new(None),
            safety_margin,
        }
    }

    /// How long the gateway keeps a token valid.
    pub fn lifetime(persist_token: bool) -> Duration {
        if persist_token {
            Duration::hours(30)
        } else {
            Duration::minutes(30)
        }
    }

    /// The cached token, unless it expires within the safety margin.
    pub async fn get(&self, now: DateTime<Utc>) -> Option<String> {
        let token = self.token.read().await;
        token
            .as_ref()
            .filter(|cached| now + self.safety_margin < cached.expires_at)
            .map(|cached| cached.value.clone())
    }

    pub async fn store(&self, value: String, expires_at: DateTime<Utc>) {
        *self.token.write().await = Some(CachedToken { value, expires_at });
    }

    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_goes_stale_inside_safety_margin() {
        let cache = TokenCache::default();
        let now = Utc::now();
        cache.store("abc".to_string(), now + Duration::minutes(30)).await;

        assert_eq!(cache.get(now).await.as_deref(), Some("abc"));
        assert_eq!(cache.get(now + Duration::minutes(24)).await.as_deref(), Some("abc"));
        assert_eq!(cache.get(now + Duration::minutes(25)).await, None);
    }

    #[tokio::test]
    async fn invalidate_drops_token() {
        let cache = TokenCache::default();
        let now = Utc::now();
        cache.store("abc".to_string(), now + Duration::hours(1)).await;

        cache.invalidate().await;

        assert_eq!(cache.get(now).await, None);
    }

    #[test]
    fn persisted_tokens_live_longer() {
        assert_eq!(TokenCache::lifetime(false), Duration::minutes(30));
        assert_eq!(TokenCache::lifetime(true), Duration::hours(30));
    }
}
