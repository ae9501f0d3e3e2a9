//! Safe entity - A petty-cash style bucket that cheques are assigned to.
//!
//! The running `current_balance` grows when cheques are assigned to the safe and is
//! adjusted by settlement transfers and cancellation reversals. Safes are never
//! deleted, only deactivated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Safe database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "safes")]
pub struct Model {
    /// Unique identifier for the safe
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Operator-facing name (e.g., "Head Office", "Warehouse")
    #[sea_orm(unique)]
    pub name: String,
    /// Balance the safe was opened with
    pub initial_balance: Decimal,
    /// Running balance after assignments, settlements, and cancellations
    pub current_balance: Decimal,
    /// Deactivated safes keep their history but accept no new assignments
    pub is_active: bool,
    /// When the safe was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Safe and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One safe has many cheques
    #[sea_orm(has_many = "super::cheque::Entity")]
    Cheques,
}

impl Related<super::cheque::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cheques.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
