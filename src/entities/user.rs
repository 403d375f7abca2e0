use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Staff role. Declaration order is the privilege ladder.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Role {
    #[sea_orm(string_value = "Staff")]
    Staff,
    #[sea_orm(string_value = "Cashier")]
    Cashier,
    #[sea_orm(string_value = "Manager")]
    Manager,
}

impl Role {
    /// True when this role is at least as privileged as `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_ladder_orders_privileges() {
        assert!(Role::Manager.satisfies(Role::Cashier));
        assert!(Role::Cashier.satisfies(Role::Staff));
        assert!(Role::Cashier.satisfies(Role::Cashier));
        assert!(!Role::Staff.satisfies(Role::Cashier));
        assert!(!Role::Cashier.satisfies(Role::Manager));
    }

    #[test]
    fn role_parses_from_its_display_form() {
        for role in [Role::Staff, Role::Cashier, Role::Manager] {
            assert_eq!(Role::from_str(&role.to_string()).unwrap(), role);
        }
        assert!(Role::from_str("Owner").is_err());
    }
}
