//! Static verifier configuration.
//!
//! Audience and issuer are fixed at construction; nothing here is discovered
//! from the token or the network.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Public X.509 metadata endpoint for hosted secure-token issuers.
pub const DEFAULT_CERTIFICATES_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

pub const DEFAULT_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// TTL applied when the key endpoint sends no `max-age`.
pub const DEFAULT_FALLBACK_TTL_SECS: u64 = 3600;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

const ENV_PROJECT_ID: &str = "STOCKYARD_AUTH_PROJECT_ID";
const ENV_AUDIENCE: &str = "STOCKYARD_AUTH_AUDIENCE";
const ENV_ISSUER: &str = "STOCKYARD_AUTH_ISSUER";
const ENV_CERTIFICATES_URL: &str = "STOCKYARD_AUTH_CERTIFICATES_URL";
const ENV_FALLBACK_TTL_SECS: &str = "STOCKYARD_AUTH_FALLBACK_TTL_SECS";
const ENV_FETCH_TIMEOUT_SECS: &str = "STOCKYARD_AUTH_FETCH_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Exact value the `aud` claim must carry (the issuer's project id).
    pub audience: String,

    /// Substring the `iss` claim must contain.
    pub issuer: String,

    /// Endpoint returning `{ kid: PEM certificate }`.
    pub certificates_url: String,

    #[serde(default = "default_fallback_ttl_secs")]
    pub fallback_ttl_secs: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fallback_ttl_secs() -> u64 {
    DEFAULT_FALLBACK_TTL_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl AuthConfig {
    /// Conventional settings for a hosted identity project.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            issuer: format!("{DEFAULT_ISSUER_PREFIX}{project_id}"),
            audience: project_id,
            certificates_url: DEFAULT_CERTIFICATES_URL.to_string(),
            fallback_ttl_secs: DEFAULT_FALLBACK_TTL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }

    /// Load from `STOCKYARD_AUTH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key/value source (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let project_id = read(ENV_PROJECT_ID).ok_or(ConfigError::Missing(ENV_PROJECT_ID))?;
        let mut config = Self::for_project(project_id);

        if let Some(audience) = read(ENV_AUDIENCE) {
            config.audience = audience;
        }
        if let Some(issuer) = read(ENV_ISSUER) {
            config.issuer = issuer;
        }
        if let Some(url) = read(ENV_CERTIFICATES_URL) {
            config.certificates_url = url;
        }
        if let Some(raw) = read(ENV_FALLBACK_TTL_SECS) {
            config.fallback_ttl_secs = parse_secs(ENV_FALLBACK_TTL_SECS, &raw)?;
        }
        if let Some(raw) = read(ENV_FETCH_TIMEOUT_SECS) {
            config.fetch_timeout_secs = parse_secs(ENV_FETCH_TIMEOUT_SECS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audience.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "audience",
                reason: "must not be empty".to_string(),
            });
        }
        // An empty issuer would make the containment check accept anything.
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "issuer",
                reason: "must not be empty".to_string(),
            });
        }
        if !(self.certificates_url.starts_with("https://") || self.certificates_url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                key: "certificates_url",
                reason: format!("not an http(s) URL: {}", self.certificates_url),
            });
        }
        if self.fallback_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "fallback_ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "fetch_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn fallback_ttl(&self) -> Duration {
        Duration::from_secs(self.fallback_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
