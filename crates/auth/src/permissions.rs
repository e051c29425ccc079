//! The closed set of permissions, named `<resource>.<action>`.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Resource a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Materials,
    Goods,
    Transfers,
    Deliveries,
    Manufacturing,
    Warehouses,
    Reports,
    Settings,
    Users,
}

macro_rules! permissions {
    ($($variant:ident => ($name:literal, $resource:ident)),+ $(,)?) => {
        /// Fine-grained capability tag (`<resource>.<action>`).
        ///
        /// The set is closed: every permission the system checks is listed here,
        /// so role tables and override lists can be validated at the edges.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Permission {
            $($variant,)+
        }

        impl Permission {
            /// Every defined permission, in declaration order.
            pub const ALL: &'static [Permission] = &[$(Permission::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Permission::$variant => $name,)+
                }
            }

            pub fn resource(&self) -> Resource {
                match self {
                    $(Permission::$variant => Resource::$resource,)+
                }
            }
        }

        impl FromStr for Permission {
            type Err = UnknownPermission;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Permission::$variant),)+
                    other => Err(UnknownPermission(other.to_string())),
                }
            }
        }
    };
}

permissions! {
    MaterialsRead => ("materials.read", Materials),
    MaterialsCreate => ("materials.create", Materials),
    MaterialsUpdate => ("materials.update", Materials),
    MaterialsDelete => ("materials.delete", Materials),

    GoodsRead => ("goods.read", Goods),
    GoodsCreate => ("goods.create", Goods),
    GoodsUpdate => ("goods.update", Goods),
    GoodsDelete => ("goods.delete", Goods),

    TransfersRead => ("transfers.read", Transfers),
    TransfersCreate => ("transfers.create", Transfers),
    TransfersApprove => ("transfers.approve", Transfers),
    TransfersDelete => ("transfers.delete", Transfers),

    DeliveriesRead => ("deliveries.read", Deliveries),
    DeliveriesCreate => ("deliveries.create", Deliveries),
    DeliveriesUpdate => ("deliveries.update", Deliveries),
    DeliveriesDelete => ("deliveries.delete", Deliveries),

    ManufacturingRead => ("manufacturing.read", Manufacturing),
    ManufacturingCreate => ("manufacturing.create", Manufacturing),
    ManufacturingUpdate => ("manufacturing.update", Manufacturing),

    WarehousesRead => ("warehouses.read", Warehouses),
    WarehousesCreate => ("warehouses.create", Warehouses),
    WarehousesUpdate => ("warehouses.update", Warehouses),
    WarehousesDelete => ("warehouses.delete", Warehouses),

    ReportsRead => ("reports.read", Reports),
    ReportsExport => ("reports.export", Reports),

    SettingsRead => ("settings.read", Settings),
    SettingsUpdate => ("settings.update", Settings),

    UsersRead => ("users.read", Users),
    UsersManage => ("users.manage", Users),
}

impl Permission {
    /// Action half of the tag (`"read"`, `"create"`, ...).
    pub fn action(&self) -> &'static str {
        let name = self.as_str();
        name.rsplit_once('.').map(|(_, action)| action).unwrap_or(name)
    }

    /// Anything other than a plain read mutates or exposes data beyond viewing.
    pub fn is_write(&self) -> bool {
        self.action() != "read"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);
