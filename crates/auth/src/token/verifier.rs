use std::sync::Arc;

use stockyard_core::Clock;

use super::VerificationStage;
use super::claims::ClaimValidator;
use super::codec;
use super::signature::SignatureVerifier;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::keys::KeyCache;
use crate::principal::DecodedIdentity;

/// Public entry point for authentication.
///
/// `Unverified → Decoded → ClaimsChecked → SignatureChecked → Verified`; any
/// failure rejects the call with that stage's error and nothing is retried.
#[derive(Clone)]
pub struct TokenVerifier {
    claims: ClaimValidator,
    signatures: SignatureVerifier,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn new(claims: ClaimValidator, keys: Arc<KeyCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            claims,
            signatures: SignatureVerifier::new(keys),
            clock,
        }
    }

    /// Verifier over the configured HTTP key endpoint.
    ///
    /// Build one per process and share it: the key cache lives inside.
    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let keys = Arc::new(KeyCache::from_config(config, clock.clone())?);
        Ok(Self::new(ClaimValidator::from_config(config), keys, clock))
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        self.signatures.key_cache()
    }

    pub async fn verify_id_token(&self, raw: &str) -> AuthResult<DecodedIdentity> {
        self.run(raw).await.inspect_err(|e| {
            tracing::debug!(kind = e.kind(), stage = ?e.stage(), "token rejected");
        })
    }

    /// Strip a `Bearer ` prefix (any case) and verify the rest.
    pub async fn verify_bearer(&self, authorization: &str) -> AuthResult<DecodedIdentity> {
        let value = authorization.trim();
        let token = value
            .get(..7)
            .filter(|scheme| scheme.eq_ignore_ascii_case("bearer "))
            .map(|_| value[7..].trim())
            .ok_or_else(|| AuthError::malformed("expected 'Bearer <token>'"))?;
        if token.is_empty() {
            return Err(AuthError::malformed("empty bearer token"));
        }
        self.verify_id_token(token).await
    }

    async fn run(&self, raw: &str) -> AuthResult<DecodedIdentity> {
        let mut stage = VerificationStage::Unverified;

        let decoded = codec::decode(raw)?;
        advance(&mut stage, VerificationStage::Decoded);

        self.claims.validate(&decoded.header, &decoded.payload, self.clock.now())?;
        advance(&mut stage, VerificationStage::ClaimsChecked);

        let segments = decoded.segments;
        self.signatures
            .verify(
                segments.header,
                segments.payload,
                segments.signature,
                decoded.header.kid.as_deref(),
            )
            .await?;
        advance(&mut stage, VerificationStage::SignatureChecked);

        let identity = DecodedIdentity::from_payload(decoded.payload);
        advance(&mut stage, VerificationStage::Verified);
        tracing::debug!(subject = %identity.subject, "token verified");
        Ok(identity)
    }
}

fn advance(stage: &mut VerificationStage, next: VerificationStage) {
    tracing::trace!(from = ?*stage, to = ?next, "verification stage");
    *stage = next;
}

impl core::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("claims", &self.claims)
            .field("signatures", &self.signatures)
            .finish_non_exhaustive()
    }
}
