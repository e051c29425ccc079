use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::authorize::PermissionResolver;
use crate::token::DecodedPayload;
use crate::{Permission, RoleAssignment};

/// Identity of an authenticated caller, as proven by a verified token.
///
/// Immutable once produced by [`crate::TokenVerifier`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedIdentity {
    /// Stable user identifier (`sub`).
    pub subject: String,
    pub email: Option<String>,
    /// Every decoded claim, including provider-specific extensions.
    pub claims: DecodedPayload,
}

impl DecodedIdentity {
    /// Expects a payload that already passed claim validation; a non-string
    /// `sub` would yield an empty subject.
    pub fn from_payload(claims: DecodedPayload) -> Self {
        Self {
            subject: claims.subject().unwrap_or_default().to_string(),
            email: claims.email.clone(),
            claims,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("role lookup failed: {0}")]
pub struct RoleLookupError(pub String);

/// External store that maps a subject id to its assigned role.
///
/// `Ok(None)` means "no role recorded", which resolves to least privilege.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn lookup_role(&self, subject: &str) -> Result<Option<String>, RoleLookupError>;
}

/// Map-backed role store for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryRoleLookup {
    roles: RwLock<HashMap<String, String>>,
}

impl InMemoryRoleLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assign(&self, subject: impl Into<String>, role: impl Into<String>) {
        self.roles.write().await.insert(subject.into(), role.into());
    }

    pub async fn revoke(&self, subject: &str) {
        self.roles.write().await.remove(subject);
    }
}

#[async_trait]
impl RoleLookup for InMemoryRoleLookup {
    async fn lookup_role(&self, subject: &str) -> Result<Option<String>, RoleLookupError> {
        Ok(self.roles.read().await.get(subject).cloned())
    }
}

/// A verified identity joined with its role and override permissions.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedIdentity {
    pub identity: DecodedIdentity,
    resolver: PermissionResolver,
}

impl AuthorizedIdentity {
    pub fn new(identity: DecodedIdentity, role: RoleAssignment, overrides: Vec<String>) -> Self {
        Self {
            identity,
            resolver: PermissionResolver::new(role, overrides),
        }
    }

    /// Look up the subject's role and join it with the identity.
    pub async fn resolve(
        identity: DecodedIdentity,
        lookup: &dyn RoleLookup,
        overrides: Vec<String>,
    ) -> Result<Self, RoleLookupError> {
        let raw = lookup.lookup_role(&identity.subject).await?;
        let role = RoleAssignment::from_raw(raw.as_deref());
        if let RoleAssignment::Unknown(value) = &role {
            tracing::warn!(subject = %identity.subject, role = %value, "role store returned an unknown role");
        }
        Ok(Self::new(identity, role, overrides))
    }

    pub fn subject(&self) -> &str {
        &self.identity.subject
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.resolver.has(permission)
    }

    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        self.resolver.has_any(permissions)
    }

    pub fn has_all(&self, permissions: &[Permission]) -> bool {
        self.resolver.has_all(permissions)
    }
}
