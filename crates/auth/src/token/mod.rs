//! Bearer ID token verification.
//!
//! Pipeline: [`codec`] → [`claims`] → [`signature`], orchestrated by
//! [`verifier::TokenVerifier`].

pub mod claims;
pub mod codec;
pub mod signature;
pub mod verifier;

use serde::Serialize;

pub use claims::{ClaimValidator, SUPPORTED_ALGORITHM};
pub use codec::{DecodedHeader, DecodedPayload, DecodedToken, RawSegments, decode};
pub use signature::SignatureVerifier;
pub use verifier::TokenVerifier;

/// How far a token got through verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStage {
    Unverified,
    Decoded,
    ClaimsChecked,
    SignatureChecked,
    Verified,
}
