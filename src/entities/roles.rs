use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Platform-wide role stored on every user row
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "trainer")]
    Trainer,
    #[sea_orm(string_value = "center")]
    Center,
    #[sea_orm(string_value = "store")]
    Store,
    #[sea_orm(string_value = "driver")]
    Driver,
    #[sea_orm(string_value = "partner")]
    Partner,
}

/// The four kinds of role entity a partner can back
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoleKind {
    #[sea_orm(string_value = "driver")]
    Driver,
    #[sea_orm(string_value = "center")]
    Center,
    #[sea_orm(string_value = "store")]
    Store,
    #[sea_orm(string_value = "trainer")]
    Trainer,
}

impl RoleKind {
    pub const ALL: [RoleKind; 4] = [
        RoleKind::Driver,
        RoleKind::Center,
        RoleKind::Store,
        RoleKind::Trainer,
    ];

    /// User role granted while an entity of this kind is active
    pub fn as_role(self) -> Role {
        match self {
            RoleKind::Driver => Role::Driver,
            RoleKind::Center => Role::Center,
            RoleKind::Store => Role::Store,
            RoleKind::Trainer => Role::Trainer,
        }
    }

    /// Broadcast topic and route segment
    pub fn topic(self) -> &'static str {
        match self {
            RoleKind::Driver => "driver",
            RoleKind::Center => "center",
            RoleKind::Store => "store",
            RoleKind::Trainer => "trainer",
        }
    }

    /// Capitalized label used in messages
    pub fn label(self) -> &'static str {
        match self {
            RoleKind::Driver => "Driver",
            RoleKind::Center => "Center",
            RoleKind::Store => "Store",
            RoleKind::Trainer => "Trainer",
        }
    }
}

impl From<RoleKind> for Role {
    fn from(kind: RoleKind) -> Self {
        kind.as_role()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn roles_render_lowercase() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::from_str("driver").unwrap(), Role::Driver);
        assert_eq!(serde_json::to_string(&RoleKind::Center).unwrap(), "\"center\"");
    }

    #[test]
    fn every_kind_maps_to_matching_role() {
        for kind in RoleKind::ALL {
            assert_eq!(kind.as_role().to_string(), kind.topic());
        }
    }
}
