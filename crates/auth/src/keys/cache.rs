//! Process-wide cache of the issuer's verification keys.
//!
//! The cache holds one immutable [`CachedKeySet`] snapshot behind an `Arc`.
//! A refresh builds a complete new snapshot and swaps it in; snapshots are
//! never edited in place, so readers always see a consistent key set.
//! Refreshes are single-flight: concurrent callers that find the cache stale
//! queue on one async mutex and reuse whatever the first of them installed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use stockyard_core::Clock;
use tokio::sync::{Mutex, RwLock};

use super::certificate::VerificationKey;
use super::source::{HttpKeySource, KeySource};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Immutable key-id → key mapping with its absolute expiry.
#[derive(Debug)]
pub struct CachedKeySet {
    keys: HashMap<String, VerificationKey>,
    expires_at: DateTime<Utc>,
}

impl CachedKeySet {
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key ids in the snapshot, sorted.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

pub struct KeyCache {
    source: Arc<dyn KeySource>,
    clock: Arc<dyn Clock>,
    fallback_ttl: Duration,
    current: RwLock<Option<Arc<CachedKeySet>>>,
    refresh: Mutex<()>,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySource>, clock: Arc<dyn Clock>, fallback_ttl: Duration) -> Self {
        Self {
            source,
            clock,
            fallback_ttl,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Cache over the configured HTTP endpoint.
    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let source = HttpKeySource::from_config(config)?;
        Ok(Self::new(Arc::new(source), clock, config.fallback_ttl()))
    }

    /// Key for `kid`, refreshing the whole set first if it is missing or stale.
    ///
    /// A `kid` absent from a fresh set is `KeyNotFound`; it does not force an
    /// early refetch, so crafted key ids cannot be used to hammer the issuer.
    pub async fn get_key(&self, kid: &str) -> AuthResult<VerificationKey> {
        let snapshot = self.fresh_snapshot().await?;
        match snapshot.get(kid) {
            Some(key) => Ok(key.clone()),
            None => {
                tracing::warn!(kid, known = ?snapshot.kids(), "token signed with unknown key id");
                Err(AuthError::KeyNotFound(kid.to_string()))
            }
        }
    }

    /// Current snapshot, refreshed if needed.
    pub async fn fresh_snapshot(&self) -> AuthResult<Arc<CachedKeySet>> {
        if let Some(snapshot) = self.current_if_fresh().await {
            return Ok(snapshot);
        }

        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(snapshot) = self.current_if_fresh().await {
            return Ok(snapshot);
        }
        self.refresh_locked().await
    }

    /// Drop the current snapshot; the next lookup fetches.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
        tracing::info!("signing key cache invalidated");
    }

    pub async fn snapshot_expiry(&self) -> Option<DateTime<Utc>> {
        self.current.read().await.as_ref().map(|s| s.expires_at())
    }

    async fn current_if_fresh(&self) -> Option<Arc<CachedKeySet>> {
        let now = self.clock.now();
        self.current
            .read()
            .await
            .as_ref()
            .filter(|snapshot| snapshot.is_fresh(now))
            .cloned()
    }

    async fn refresh_locked(&self) -> AuthResult<Arc<CachedKeySet>> {
        let response = self.source.fetch().await.inspect_err(|e| {
            tracing::warn!(error = %e, "signing key refresh failed");
        })?;

        let keys = response
            .certificates
            .iter()
            .map(|(kid, pem)| VerificationKey::from_certificate_pem(kid.as_str(), pem).map(|key| (kid.clone(), key)))
            .collect::<AuthResult<HashMap<_, _>>>()
            .inspect_err(|e| tracing::warn!(error = %e, "signing key import failed"))?;

        let ttl_secs = response
            .cache_control
            .as_deref()
            .and_then(parse_max_age)
            .unwrap_or_else(|| self.fallback_ttl.as_secs());
        let now = self.clock.now();
        let expires_at = expiry_after(now, ttl_secs);

        let snapshot = Arc::new(CachedKeySet { keys, expires_at });
        *self.current.write().await = Some(snapshot.clone());

        tracing::info!(
            key_count = snapshot.len(),
            ttl_secs,
            expires_at = %expires_at,
            "signing key cache refreshed"
        );
        Ok(snapshot)
    }
}

impl core::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyCache")
            .field("fallback_ttl", &self.fallback_ttl)
            .finish_non_exhaustive()
    }
}

fn expiry_after(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    let ttl = i64::try_from(ttl_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `max-age` seconds from a `Cache-Control` value, if present and numeric.
pub fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value.trim().trim_matches('"').parse::<u64>().ok()
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use stockyard_core::ManualClock;

    use super::*;
    use crate::keys::source::{KeySetResponse, StaticKeySource};

    const PRIMARY_CERT: &str = include_str!("../../tests/fixtures/primary.cert.pem");
    const ROGUE_CERT: &str = include_str!("../../tests/fixtures/rogue.cert.pem");

    const T0: i64 = 1_700_000_000;

    fn cache_over(source: Arc<dyn KeySource>, clock: Arc<ManualClock>) -> KeyCache {
        KeyCache::new(source, clock, Duration::from_secs(3600))
    }

    #[test]
    fn max_age_parsing() {
        assert_eq!(parse_max_age("public, max-age=19800, must-revalidate"), Some(19800));
        assert_eq!(parse_max_age("MAX-AGE = 60"), Some(60));
        assert_eq!(parse_max_age("max-age=\"30\""), Some(30));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
        assert_eq!(parse_max_age("s-maxage=10"), None);
        assert_eq!(parse_max_age(""), None);
    }

    #[tokio::test]
    async fn hits_within_ttl_do_not_refetch() {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let source = Arc::new(StaticKeySource::single("k1", PRIMARY_CERT, Some("max-age=600")));
        let cache = cache_over(source.clone(), clock.clone());

        for _ in 0..10 {
            cache.get_key("k1").await.unwrap();
            clock.advance(chrono::Duration::seconds(59));
        }
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(cache.snapshot_expiry().await.unwrap().timestamp(), T0 + 600);
    }

    #[tokio::test]
    async fn expiry_triggers_exactly_one_refetch() {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let source = Arc::new(StaticKeySource::single("k1", PRIMARY_CERT, Some("max-age=600")));
        let cache = cache_over(source.clone(), clock.clone());

        cache.get_key("k1").await.unwrap();
        clock.advance(chrono::Duration::seconds(599));
        cache.get_key("k1").await.unwrap();
        assert_eq!(source.fetch_count(), 1);

        // Expiry at exactly `now` counts as stale.
        clock.advance(chrono::Duration::seconds(1));
        cache.get_key("k1").await.unwrap();
        cache.get_key("k1").await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn missing_max_age_uses_fallback_ttl() {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let source = Arc::new(StaticKeySource::single("k1", PRIMARY_CERT, Some("public")));
        let cache = cache_over(source, clock);

        cache.get_key("k1").await.unwrap();
        assert_eq!(cache.snapshot_expiry().await.unwrap().timestamp(), T0 + 3600);
    }

    #[tokio::test]
    async fn unknown_kid_is_not_found_without_refetch() {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let source = Arc::new(StaticKeySource::single("k1", PRIMARY_CERT, None));
        let cache = cache_over(source.clone(), clock);

        cache.get_key("k1").await.unwrap();
        let err = cache.get_key("rotated").await.unwrap_err();
        assert_eq!(err, AuthError::KeyNotFound("rotated".to_string()));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn bad_certificate_is_import_failure_and_nothing_is_cached() {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let mut certificates = HashMap::new();
        certificates.insert("k1".to_string(), PRIMARY_CERT.to_string());
        certificates.insert("k2".to_string(), "garbage".to_string());
        let source = Arc::new(StaticKeySource::new(KeySetResponse {
            certificates,
            cache_control: None,
        }));
        let cache = cache_over(source, clock);

        let err = cache.get_key("k1").await.unwrap_err();
        assert!(matches!(err, AuthError::KeyImportFailed { ref kid, .. } if kid == "k2"));
        assert!(cache.snapshot_expiry().await.is_none());
    }

    #[tokio::test]
    async fn snapshot_is_replaced_wholesale() {
        struct Rotating {
            calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl KeySource for Rotating {
            async fn fetch(&self) -> AuthResult<KeySetResponse> {
                let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let (kid, pem) = if call == 0 { ("old", PRIMARY_CERT) } else { ("new", ROGUE_CERT) };
                let mut certificates = HashMap::new();
                certificates.insert(kid.to_string(), pem.to_string());
                Ok(KeySetResponse {
                    certificates,
                    cache_control: Some("max-age=60".to_string()),
                })
            }
        }

        let clock = Arc::new(ManualClock::at_unix(T0));
        let source = Arc::new(Rotating {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let cache = cache_over(source, clock.clone());

        let before = cache.fresh_snapshot().await.unwrap();
        assert_eq!(before.kids(), vec!["old"]);

        clock.advance(chrono::Duration::seconds(61));
        let after = cache.fresh_snapshot().await.unwrap();
        assert_eq!(after.kids(), vec!["new"]);
        assert!(matches!(cache.get_key("old").await, Err(AuthError::KeyNotFound(_))));
        // The old snapshot held by an in-flight reader is untouched.
        assert_eq!(before.kids(), vec!["old"]);
    }

    #[tokio::test]
    async fn failed_refresh_propagates_and_next_call_retries() {
        struct Flaky {
            calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl KeySource for Flaky {
            async fn fetch(&self) -> AuthResult<KeySetResponse> {
                if self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    return Err(AuthError::fetch_failed("connection reset"));
                }
                let mut certificates = HashMap::new();
                certificates.insert("k1".to_string(), PRIMARY_CERT.to_string());
                Ok(KeySetResponse {
                    certificates,
                    cache_control: None,
                })
            }
        }

        let clock = Arc::new(ManualClock::at_unix(T0));
        let cache = cache_over(
            Arc::new(Flaky {
                calls: std::sync::atomic::AtomicUsize::new(0),
            }),
            clock,
        );

        assert!(matches!(cache.get_key("k1").await, Err(AuthError::KeyFetchFailed(_))));
        assert!(cache.get_key("k1").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_one_fetch() {
        struct Slow {
            inner: StaticKeySource,
        }

        #[async_trait]
        impl KeySource for Slow {
            async fn fetch(&self) -> AuthResult<KeySetResponse> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.inner.fetch().await
            }
        }

        let clock = Arc::new(ManualClock::at_unix(T0));
        let source = Arc::new(Slow {
            inner: StaticKeySource::single("k1", PRIMARY_CERT, Some("max-age=600")),
        });
        let cache = Arc::new(cache_over(source.clone(), clock));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_key("k1").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(source.inner.fetch_count(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let source = Arc::new(StaticKeySource::single("k1", PRIMARY_CERT, Some("max-age=600")));
        let cache = cache_over(source.clone(), clock);

        cache.get_key("k1").await.unwrap();
        cache.invalidate().await;
        assert!(cache.snapshot_expiry().await.is_none());
        cache.get_key("k1").await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[test]
    fn huge_max_age_saturates() {
        let now = DateTime::from_timestamp(T0, 0).unwrap();
        assert_eq!(expiry_after(now, u64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(expiry_after(now, 0), now);
    }
}
