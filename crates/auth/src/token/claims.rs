//! Claim validation (time bounds and identity checks).
//!
//! Pure functions of the decoded token and "now"; no I/O. No clock-skew
//! allowance is applied.

use chrono::{DateTime, Utc};

use super::codec::{DecodedHeader, DecodedPayload, claim_text};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// The only signing algorithm this verifier trusts.
pub const SUPPORTED_ALGORITHM: &str = "RS256";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimValidator {
    audience: String,
    issuer: String,
}

impl ClaimValidator {
    pub fn new(audience: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            issuer: issuer.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.audience.clone(), config.issuer.clone())
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Run every check in order; the first failure wins.
    ///
    /// The header is taken here so the algorithm check runs first, ahead of
    /// the payload checks.
    pub fn validate(&self, header: &DecodedHeader, payload: &DecodedPayload, now: DateTime<Utc>) -> AuthResult<()> {
        check_algorithm(header)?;
        check_expiry(payload, now)?;
        check_issued_at(payload, now)?;
        check_audience(payload, &self.audience)?;
        check_issuer(payload, &self.issuer)?;
        check_subject(payload)?;
        Ok(())
    }
}

pub fn check_algorithm(header: &DecodedHeader) -> AuthResult<()> {
    if header.alg == SUPPORTED_ALGORITHM {
        Ok(())
    } else {
        Err(AuthError::UnsupportedAlgorithm(header.alg.clone()))
    }
}

/// `exp` must be strictly after `now`.
pub fn check_expiry(payload: &DecodedPayload, now: DateTime<Utc>) -> AuthResult<()> {
    if epoch_millis(payload.exp) > now_millis(now) {
        Ok(())
    } else {
        Err(AuthError::TokenExpired)
    }
}

/// `iat` must not be after `now`.
pub fn check_issued_at(payload: &DecodedPayload, now: DateTime<Utc>) -> AuthResult<()> {
    if epoch_millis(payload.iat) > now_millis(now) {
        Err(AuthError::TokenNotYetValid)
    } else {
        Ok(())
    }
}

/// `aud` must be a string equal to the project id. Arrays are not accepted.
pub fn check_audience(payload: &DecodedPayload, expected: &str) -> AuthResult<()> {
    if payload.audience() == Some(expected) {
        Ok(())
    } else {
        Err(AuthError::AudienceMismatch {
            expected: expected.to_string(),
            actual: claim_text(&payload.aud),
        })
    }
}

/// `iss` must be a string containing the configured issuer.
pub fn check_issuer(payload: &DecodedPayload, expected: &str) -> AuthResult<()> {
    let matches = payload
        .issuer()
        .is_some_and(|iss| !expected.is_empty() && iss.contains(expected));
    if matches {
        Ok(())
    } else {
        Err(AuthError::IssuerMismatch {
            expected: expected.to_string(),
            actual: claim_text(&payload.iss),
        })
    }
}

/// `sub` must be a non-empty string.
pub fn check_subject(payload: &DecodedPayload) -> AuthResult<()> {
    if payload.subject().is_none_or(str::is_empty) {
        Err(AuthError::MissingSubject)
    } else {
        Ok(())
    }
}

fn epoch_millis(secs: f64) -> f64 {
    secs * 1000.0
}

fn now_millis(now: DateTime<Utc>) -> f64 {
    now.timestamp_millis() as f64
}
