//! Static role → permission table.
//!
//! Written as an exhaustive `match` so adding a [`Role`] without a table entry
//! is a compile error.

use crate::{Permission, Role};

use crate::permissions::Permission::*;

const MANAGER: &[Permission] = &[
    MaterialsRead,
    MaterialsCreate,
    MaterialsUpdate,
    MaterialsDelete,
    GoodsRead,
    GoodsCreate,
    GoodsUpdate,
    GoodsDelete,
    TransfersRead,
    TransfersCreate,
    TransfersApprove,
    TransfersDelete,
    DeliveriesRead,
    DeliveriesCreate,
    DeliveriesUpdate,
    DeliveriesDelete,
    ManufacturingRead,
    ManufacturingCreate,
    ManufacturingUpdate,
    WarehousesRead,
    WarehousesCreate,
    WarehousesUpdate,
    ReportsRead,
    ReportsExport,
    SettingsRead,
    UsersRead,
];

const STAFF: &[Permission] = &[
    MaterialsRead,
    MaterialsCreate,
    MaterialsUpdate,
    GoodsRead,
    GoodsCreate,
    GoodsUpdate,
    TransfersRead,
    TransfersCreate,
    DeliveriesRead,
    DeliveriesCreate,
    DeliveriesUpdate,
    ManufacturingRead,
    ManufacturingCreate,
    ManufacturingUpdate,
    WarehousesRead,
    ReportsRead,
];

const VIEWER: &[Permission] = &[
    MaterialsRead,
    GoodsRead,
    TransfersRead,
    DeliveriesRead,
    ManufacturingRead,
    WarehousesRead,
    ReportsRead,
];

/// Permissions granted to `role`. Total: every role has an entry.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => Permission::ALL,
        Role::Manager => MANAGER,
        Role::Staff => STAFF,
        Role::Viewer => VIEWER,
    }
}

/// Whether `role`'s table entry contains `permission`.
pub fn role_has(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

/// Roles whose table entry contains `permission`, most privileged first.
pub fn roles_granting(permission: Permission) -> Vec<Role> {
    Role::ALL
        .into_iter()
        .filter(|role| role_has(*role, permission))
        .collect()
}
