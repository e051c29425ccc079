use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// One response from the issuer's key endpoint, before any import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySetResponse {
    /// Key id → PEM-encoded X.509 certificate.
    pub certificates: HashMap<String, String>,
    /// Raw `Cache-Control` header value, if the endpoint sent one.
    pub cache_control: Option<String>,
}

/// Where the issuer's current signing certificates come from.
///
/// One call is one network round trip; caching lives in [`super::KeyCache`].
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> AuthResult<KeySetResponse>;
}

/// Production source: GET against the issuer's public metadata URL.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::fetch_failed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Self::new(config.certificates_url.clone(), config.fetch_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> AuthResult<KeySetResponse> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AuthError::fetch_failed(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::fetch_failed(format!("{} returned HTTP {status}", self.url)));
        }

        let cache_control = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let certificates: HashMap<String, String> = response
            .json()
            .await
            .map_err(|e| AuthError::fetch_failed(format!("invalid key set from {}: {e}", self.url)))?;

        tracing::debug!(url = %self.url, key_count = certificates.len(), "fetched signing certificates");

        Ok(KeySetResponse {
            certificates,
            cache_control,
        })
    }
}

/// Fixed key set, for pinned deployments and tests. Counts fetches.
#[derive(Debug, Default)]
pub struct StaticKeySource {
    response: KeySetResponse,
    fetches: AtomicUsize,
}

impl StaticKeySource {
    pub fn new(response: KeySetResponse) -> Self {
        Self {
            response,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Single `kid` → certificate entry with the given `Cache-Control` value.
    pub fn single(kid: impl Into<String>, certificate_pem: impl Into<String>, cache_control: Option<&str>) -> Self {
        let mut certificates = HashMap::new();
        certificates.insert(kid.into(), certificate_pem.into());
        Self::new(KeySetResponse {
            certificates,
            cache_control: cache_control.map(str::to_string),
        })
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> AuthResult<KeySetResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}
