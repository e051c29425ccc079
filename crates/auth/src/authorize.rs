use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::table::{permissions_for, role_has, roles_granting};
use crate::{Permission, Role, RoleAssignment};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),
}

/// Answers permission questions for one role assignment plus its overrides.
///
/// - No IO
/// - No panics
/// - Unknown roles fail closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionResolver {
    assignment: RoleAssignment,
    overrides: Vec<String>,
}

impl PermissionResolver {
    pub fn new(assignment: impl Into<RoleAssignment>, overrides: Vec<String>) -> Self {
        Self {
            assignment: assignment.into(),
            overrides,
        }
    }

    /// Resolver over raw values as stored by the role store.
    pub fn from_raw(role: Option<&str>, overrides: Option<&[String]>) -> Self {
        Self {
            assignment: RoleAssignment::from_raw(role),
            overrides: overrides.map(<[String]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn assignment(&self) -> &RoleAssignment {
        &self.assignment
    }

    pub fn overrides(&self) -> &[String] {
        &self.overrides
    }

    fn overridden(&self, permission: Permission) -> bool {
        self.overrides.iter().any(|o| o == permission.as_str())
    }

    pub fn has(&self, permission: Permission) -> bool {
        if self.overridden(permission) {
            return true;
        }
        match self.assignment.effective_role() {
            Some(role) => role_has(role, permission),
            None => false,
        }
    }

    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has(*p))
    }

    /// Vacuously true for an empty list.
    pub fn has_all(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has(*p))
    }

    /// Role entry plus every override naming a known permission, sorted.
    pub fn effective_permissions(&self) -> Vec<Permission> {
        let mut set: BTreeSet<Permission> = self
            .assignment
            .effective_role()
            .map(|role| permissions_for(role).iter().copied().collect())
            .unwrap_or_default();
        set.extend(self.overrides.iter().filter_map(|o| o.parse::<Permission>().ok()));
        set.into_iter().collect()
    }
}

/// `role` as stored (`None` when absent), overrides as stored.
pub fn has_permission(role: Option<&str>, permission: Permission, overrides: Option<&[String]>) -> bool {
    PermissionResolver::from_raw(role, overrides).has(permission)
}

pub fn has_any_permission(role: Option<&str>, permissions: &[Permission], overrides: Option<&[String]>) -> bool {
    PermissionResolver::from_raw(role, overrides).has_any(permissions)
}

pub fn has_all_permissions(role: Option<&str>, permissions: &[Permission], overrides: Option<&[String]>) -> bool {
    PermissionResolver::from_raw(role, overrides).has_all(permissions)
}

/// Result-shaped permission check for callers that propagate with `?`.
pub fn authorize(resolver: &PermissionResolver, required: Permission) -> Result<(), AuthzError> {
    if resolver.has(required) {
        Ok(())
    } else {
        tracing::debug!(permission = %required, assignment = ?resolver.assignment(), "permission denied");
        Err(AuthzError::Forbidden(required))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Which rule produced a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    Override,
    Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownRole,
    MissingPermission,
}

/// Auditable account of a single permission decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: Permission,
    pub granted: bool,
    pub granted_by: Option<GrantSource>,
    pub denial: Option<DenialKind>,
    pub assignment: RoleAssignment,
    /// Role whose table entry was consulted (after the least-privilege fallback).
    pub effective_role: Option<Role>,
    pub effective_permissions: Vec<Permission>,
    /// Roles that would grant the permission, for operator hints on denial.
    pub granting_roles: Vec<Role>,
    pub reason: String,
}

/// Explain why `required` is (or would be) granted or denied.
pub fn explain_authorization(resolver: &PermissionResolver, required: Permission) -> AuthorizationExplanation {
    let assignment = resolver.assignment().clone();
    let effective_role = assignment.effective_role();
    let effective_permissions = resolver.effective_permissions();
    let granting_roles = roles_granting(required);

    let (granted_by, denial, reason) = if resolver.overridden(required) {
        (
            Some(GrantSource::Override),
            None,
            format!("'{required}' is granted explicitly by an override"),
        )
    } else {
        match (&assignment, effective_role) {
            (RoleAssignment::Unknown(raw), _) => (
                None,
                Some(DenialKind::UnknownRole),
                format!("role '{raw}' is not recognised; unknown roles are denied"),
            ),
            (_, Some(role)) if role_has(role, required) => (
                Some(GrantSource::Role),
                None,
                format!("role '{role}' grants '{required}'"),
            ),
            (_, role) => (
                None,
                Some(DenialKind::MissingPermission),
                format!(
                    "role '{}' does not grant '{required}'",
                    role.map(|r| r.as_str()).unwrap_or("none")
                ),
            ),
        }
    };

    AuthorizationExplanation {
        required_permission: required,
        granted: granted_by.is_some(),
        granted_by,
        denial,
        assignment,
        effective_role,
        effective_permissions,
        granting_roles,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn overrides(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn override_bypasses_role_table() {
        let list = overrides(&["goods.delete"]);
        assert!(!has_permission(Some("viewer"), Permission::GoodsDelete, None));
        assert!(has_permission(Some("viewer"), Permission::GoodsDelete, Some(&list)));
        // Overrides apply even when the role is unknown.
        assert!(has_permission(Some("intern"), Permission::GoodsDelete, Some(&list)));
    }

    #[test]
    fn missing_role_falls_back_to_viewer() {
        assert!(has_permission(None, Permission::GoodsRead, None));
        assert!(!has_permission(None, Permission::GoodsCreate, None));
    }

    #[test]
    fn unknown_role_fails_closed() {
        assert!(!has_permission(Some("superuser"), Permission::GoodsRead, None));
        assert!(!has_any_permission(Some("superuser"), Permission::ALL, None));
    }

    #[test]
    fn role_lookup_is_exact() {
        assert!(has_permission(Some("admin"), Permission::UsersManage, None));
        for raw in ["Admin", "ADMIN", " admin"] {
            assert!(!has_any_permission(Some(raw), Permission::ALL, None), "{raw:?}");
        }
    }

    #[test]
    fn any_and_all_quantify() {
        let perms = [Permission::TransfersRead, Permission::TransfersApprove];
        assert!(has_any_permission(Some("staff"), &perms, None));
        assert!(!has_all_permissions(Some("staff"), &perms, None));
        assert!(has_all_permissions(Some("manager"), &perms, None));
        assert!(has_all_permissions(Some("viewer"), &[], None));
        assert!(!has_any_permission(Some("admin"), &[], None));
    }

    #[test]
    fn authorize_returns_forbidden() {
        let resolver = PermissionResolver::new(Role::Staff, Vec::new());
        assert!(authorize(&resolver, Permission::GoodsCreate).is_ok());
        assert_eq!(
            authorize(&resolver, Permission::UsersManage),
            Err(AuthzError::Forbidden(Permission::UsersManage))
        );
    }

    #[test]
    fn effective_permissions_merge_known_overrides() {
        let resolver = PermissionResolver::new(
            Role::Viewer,
            overrides(&["reports.export", "not.a.permission"]),
        );
        let perms = resolver.effective_permissions();
        assert!(perms.contains(&Permission::ReportsExport));
        assert!(perms.contains(&Permission::GoodsRead));
        assert_eq!(perms.len(), permissions_for(Role::Viewer).len() + 1);
    }

    #[test]
    fn explanation_names_the_grant_path() {
        let resolver = PermissionResolver::new(Role::Viewer, overrides(&["reports.export"]));

        let by_override = explain_authorization(&resolver, Permission::ReportsExport);
        assert!(by_override.granted);
        assert_eq!(by_override.granted_by, Some(GrantSource::Override));

        let by_role = explain_authorization(&resolver, Permission::GoodsRead);
        assert_eq!(by_role.granted_by, Some(GrantSource::Role));

        let denied = explain_authorization(&resolver, Permission::UsersManage);
        assert!(!denied.granted);
        assert_eq!(denied.denial, Some(DenialKind::MissingPermission));
        assert_eq!(denied.granting_roles, vec![Role::Admin]);
    }

    #[test]
    fn explanation_flags_unknown_roles() {
        let resolver = PermissionResolver::from_raw(Some("root"), None);
        let explanation = explain_authorization(&resolver, Permission::GoodsRead);
        assert!(!explanation.granted);
        assert_eq!(explanation.denial, Some(DenialKind::UnknownRole));
        assert!(explanation.effective_permissions.is_empty());

        let json = serde_json::to_value(&explanation).unwrap();
        assert_eq!(json["required_permission"], "goods.read");
        assert_eq!(json["assignment"]["kind"], "unknown");
    }

    fn any_permission() -> impl Strategy<Value = Permission> {
        prop::sample::select(Permission::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: admin holds every permission with or without overrides.
        #[test]
        fn admin_has_every_permission(permission in any_permission()) {
            prop_assert!(has_permission(Some("admin"), permission, None));
        }

        /// Property: viewer never holds a write permission through the table.
        #[test]
        fn viewer_never_writes(permission in any_permission()) {
            prop_assume!(permission.is_write());
            prop_assert!(!has_permission(Some("viewer"), permission, None));
        }

        /// Property: naming a permission in overrides always grants it.
        #[test]
        fn override_always_grants(permission in any_permission()) {
            let list = vec![permission.as_str().to_string()];
            prop_assert!(has_permission(Some("viewer"), permission, Some(&list)));
        }

        /// Property: has_any/has_all agree with per-permission checks.
        #[test]
        fn quantifiers_match_single_checks(
            perms in prop::collection::vec(any_permission(), 0..6),
            role_index in 0usize..4,
        ) {
            let role = Role::ALL[role_index];
            let resolver = PermissionResolver::new(role, Vec::new());
            prop_assert_eq!(resolver.has_any(&perms), perms.iter().any(|p| resolver.has(*p)));
            prop_assert_eq!(resolver.has_all(&perms), perms.iter().all(|p| resolver.has(*p)));
        }
    }
}
