//! Roles and what the external role store can say about a subject.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Ordered by decreasing privilege. Each role's permissions are enumerated
/// explicitly in [`crate::table`]; nothing is inherited from the role below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Staff, Role::Viewer];

    /// Role applied when the role store has nothing for a subject.
    pub const LEAST_PRIVILEGED: Role = Role::Viewer;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Viewer => "viewer",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact match on the stored value. `"Admin"` or `" admin"` are not roles.
impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

/// What the external role store said about a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum RoleAssignment {
    Known(Role),
    /// A value the table does not know; always denied.
    Unknown(String),
    /// No role recorded; treated as [`Role::LEAST_PRIVILEGED`].
    Unassigned,
}

impl RoleAssignment {
    /// Interpret a raw role value from storage.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => RoleAssignment::Unassigned,
            Some(value) => match value.parse::<Role>() {
                Ok(role) => RoleAssignment::Known(role),
                Err(_) => RoleAssignment::Unknown(value.to_string()),
            },
        }
    }

    /// Role whose table entry applies, if any.
    pub fn effective_role(&self) -> Option<Role> {
        match self {
            RoleAssignment::Known(role) => Some(*role),
            RoleAssignment::Unassigned => Some(Role::LEAST_PRIVILEGED),
            RoleAssignment::Unknown(_) => None,
        }
    }
}

impl From<Role> for RoleAssignment {
    fn from(role: Role) -> Self {
        RoleAssignment::Known(role)
    }
}

impl From<Option<Role>> for RoleAssignment {
    fn from(role: Option<Role>) -> Self {
        role.map(RoleAssignment::Known).unwrap_or(RoleAssignment::Unassigned)
    }
}
