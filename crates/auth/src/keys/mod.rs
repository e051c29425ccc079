//! Issuer signing keys: retrieval, import and TTL caching.

pub mod cache;
pub mod certificate;
pub mod source;

pub use cache::{CachedKeySet, KeyCache, parse_max_age};
pub use certificate::VerificationKey;
pub use source::{HttpKeySource, KeySetResponse, KeySource, StaticKeySource};
