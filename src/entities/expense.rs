//! Expense entity - Money spent against a single cheque.
//!
//! Expenses are append-only: the amount never changes after insert and rows are
//! never deleted. Cheque totals are always summed from these rows.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Cheque the expense is drawn against
    pub cheque_id: i64,
    /// Optional category (owned by the category registry)
    pub category_id: Option<i64>,
    /// Amount spent, always positive
    pub amount: Decimal,
    /// What the money was spent on
    pub description: String,
    /// Who was paid
    pub paid_to: Option<String>,
    /// Server-assigned time of posting
    pub expense_date: DateTimeUtc,
    /// Posting status, `"posted"` for every expense recorded by this crate
    pub status: String,
}

/// Defines relationships between Expense and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense belongs to one cheque
    #[sea_orm(
        belongs_to = "super::cheque::Entity",
        from = "Column::ChequeId",
        to = "super::cheque::Column::Id"
    )]
    Cheque,
}

impl Related<super::cheque::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cheque.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
