//! Authentication error model.

use thiserror::Error;

use crate::token::VerificationStage;

/// Result type used across the authentication layer.
pub type AuthResult<T> = Result<T, AuthError>;

/// Why a token (or the key material needed to check it) was rejected.
///
/// Every variant is terminal for the call that produced it; nothing in this
/// crate retries. Messages never include token contents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Structural decode failure (segment count, base64url, JSON shape).
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unsupported signing algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("token not yet valid (issued in the future)")]
    TokenNotYetValid,

    #[error("audience mismatch: expected '{expected}', got '{actual}'")]
    AudienceMismatch { expected: String, actual: String },

    #[error("issuer mismatch: expected issuer containing '{expected}', got '{actual}'")]
    IssuerMismatch { expected: String, actual: String },

    #[error("token has no subject")]
    MissingSubject,

    /// No cached key matches the token's key id.
    #[error("no signing key found for kid '{0}'")]
    KeyNotFound(String),

    #[error("failed to fetch signing keys: {0}")]
    KeyFetchFailed(String),

    #[error("failed to import signing key '{kid}': {reason}")]
    KeyImportFailed { kid: String, reason: String },

    #[error("token signature is invalid")]
    InvalidSignature,
}

impl AuthError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }

    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::KeyFetchFailed(msg.into())
    }

    pub fn import_failed(kid: impl Into<String>, reason: impl ToString) -> Self {
        Self::KeyImportFailed {
            kid: kid.into(),
            reason: reason.to_string(),
        }
    }

    /// Stage of the verification pipeline the token had reached when it was
    /// rejected.
    pub fn stage(&self) -> VerificationStage {
        match self {
            AuthError::MalformedToken(_) => VerificationStage::Unverified,
            AuthError::UnsupportedAlgorithm(_)
            | AuthError::TokenExpired
            | AuthError::TokenNotYetValid
            | AuthError::AudienceMismatch { .. }
            | AuthError::IssuerMismatch { .. }
            | AuthError::MissingSubject => VerificationStage::Decoded,
            AuthError::KeyNotFound(_)
            | AuthError::KeyFetchFailed(_)
            | AuthError::KeyImportFailed { .. }
            | AuthError::InvalidSignature => VerificationStage::ClaimsChecked,
        }
    }

    /// True when the failure is about key infrastructure rather than the
    /// token itself.
    pub fn is_key_unavailable(&self) -> bool {
        matches!(
            self,
            AuthError::KeyNotFound(_) | AuthError::KeyFetchFailed(_) | AuthError::KeyImportFailed { .. }
        )
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::AudienceMismatch { .. } => "audience_mismatch",
            AuthError::IssuerMismatch { .. } => "issuer_mismatch",
            AuthError::MissingSubject => "missing_subject",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::KeyFetchFailed(_) => "key_fetch_failed",
            AuthError::KeyImportFailed { .. } => "key_import_failed",
            AuthError::InvalidSignature => "invalid_signature",
        }
    }
}

/// Configuration loading/validation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
