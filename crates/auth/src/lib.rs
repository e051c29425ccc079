//! `stockyard-auth`: bearer token authentication and role-based authorization.
//!
//! Two halves:
//! - [`TokenVerifier`] checks RS256 ID tokens against the issuer's rotating
//!   X.509 signing keys, using only RSA/SHA-256 primitives.
//! - [`PermissionResolver`] maps a role (plus explicit overrides) to the
//!   static permission table.
//!
//! This crate is intentionally decoupled from HTTP routing and storage.

pub mod authorize;
pub mod config;
pub mod error;
pub mod keys;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod table;
pub mod token;

pub use authorize::{
    AuthorizationExplanation, AuthzError, PermissionResolver, authorize, explain_authorization, has_all_permissions,
    has_any_permission, has_permission,
};
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, ConfigError};
pub use keys::{HttpKeySource, KeyCache, KeySetResponse, KeySource, StaticKeySource, VerificationKey};
pub use permissions::{Permission, Resource};
pub use principal::{AuthorizedIdentity, DecodedIdentity, InMemoryRoleLookup, RoleLookup, RoleLookupError};
pub use roles::{Role, RoleAssignment};
pub use table::permissions_for;
pub use token::{DecodedHeader, DecodedPayload, TokenVerifier, VerificationStage};
