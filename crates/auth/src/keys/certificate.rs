use std::sync::Arc;

use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use sha2::Sha256;
use x509_cert::Certificate;
use x509_cert::der::{DecodePem, Encode};

use crate::error::{AuthError, AuthResult};

/// RS256 verification key imported from an issuer certificate.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    inner: Arc<VerifyingKey<Sha256>>,
}

impl core::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VerificationKey").field("kid", &self.kid).finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Import the RSA subject public key of a PEM-encoded X.509 certificate.
    pub fn from_certificate_pem(kid: impl Into<String>, pem: &str) -> AuthResult<Self> {
        let kid = kid.into();
        let cert = Certificate::from_pem(pem.as_bytes()).map_err(|e| AuthError::import_failed(&kid, e))?;
        let spki = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| AuthError::import_failed(&kid, e))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki).map_err(|e| AuthError::import_failed(&kid, e))?;
        Ok(Self::from_public_key(kid, public_key))
    }

    pub fn from_public_key(kid: impl Into<String>, public_key: RsaPublicKey) -> Self {
        Self {
            kid: kid.into(),
            inner: Arc::new(VerifyingKey::<Sha256>::new(public_key)),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// RSASSA-PKCS1-v1_5 / SHA-256 check of `signature` over `message`.
    ///
    /// Any malformed signature (wrong length, out of range) is simply `false`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        self.inner.verify(message, &signature).is_ok()
    }
}
