use std::sync::Arc;

use super::codec::{RawSegments, decode_segment};
use crate::error::{AuthError, AuthResult};
use crate::keys::{KeyCache, VerificationKey};

/// RS256 signature check against the cached issuer keys.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    keys: Arc<KeyCache>,
}

impl SignatureVerifier {
    pub fn new(keys: Arc<KeyCache>) -> Self {
        Self { keys }
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Verify `signature_segment` over the literal `"{header}.{payload}"` bytes.
    ///
    /// Key lookup errors propagate unchanged; a signature that does not check
    /// out is `InvalidSignature`.
    pub async fn verify(
        &self,
        header_segment: &str,
        payload_segment: &str,
        signature_segment: &str,
        kid: Option<&str>,
    ) -> AuthResult<()> {
        let kid = kid.ok_or_else(|| AuthError::KeyNotFound("<none>".to_string()))?;
        let key = self.keys.get_key(kid).await?;

        let segments = RawSegments {
            header: header_segment,
            payload: payload_segment,
            signature: signature_segment,
        };
        verify_with_key(&key, &segments)
    }
}

/// Synchronous check of already-split segments against a known key.
pub fn verify_with_key(key: &VerificationKey, segments: &RawSegments<'_>) -> AuthResult<()> {
    let signature = decode_segment(segments.signature).map_err(|_| AuthError::InvalidSignature)?;
    if key.verify(&segments.signing_input(), &signature) {
        Ok(())
    } else {
        Err(AuthError::InvalidSignature)
    }
}
