//! Cheque entity - The central record of the ledger.
//!
//! A cheque starts blank (`amount == 0`, no safe), is assigned to a safe with a face
//! amount and beneficiary, accrues expenses, and ends either settled or cancelled.
//! Overspend is never stored here; it is derived from the expense ledger on read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stored lifecycle status of a cheque.
///
/// `Pending`, `Open`, and `Active` are legacy blank states that behave like `Created`
/// for the purpose of drawing settling cheques.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ChequeStatus {
    /// Blank cheque, no safe, amount zero
    #[sea_orm(string_value = "created")]
    Created,
    /// Legacy blank state
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Legacy blank state
    #[sea_orm(string_value = "open")]
    Open,
    /// Legacy blank state
    #[sea_orm(string_value = "active")]
    Active,
    /// Assigned to a safe with an amount and beneficiary
    #[sea_orm(string_value = "assigned")]
    Assigned,
    /// Supplier payment awaiting its invoice
    #[sea_orm(string_value = "settled_pending_invoice")]
    SettledPendingInvoice,
    /// Fully resolved
    #[sea_orm(string_value = "settled")]
    Settled,
    /// Reversed before any expense was posted
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl ChequeStatus {
    /// Statuses from which a blank cheque may be drawn as a settling cheque.
    pub const SETTLING_POOL: [Self; 4] = [Self::Created, Self::Pending, Self::Open, Self::Active];

    /// Statuses from which a cheque may still be cancelled.
    pub const CANCELLABLE: [Self; 2] = [Self::Created, Self::Assigned];

    /// True once no further lifecycle transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled)
    }
}

/// Cheque database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cheques")]
pub struct Model {
    /// Unique identifier for the cheque
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Printed cheque number, unique per bank account
    pub cheque_number: String,
    /// Bank account the cheque book belongs to (owned by the account registry)
    pub bank_account_id: i64,
    /// Face amount; zero means blank
    pub amount: Decimal,
    /// Stored lifecycle status
    pub status: ChequeStatus,
    /// Safe the cheque is assigned to
    pub safe_id: Option<i64>,
    /// Beneficiary name
    pub issued_to: Option<String>,
    /// Department the cheque was issued for
    pub department: Option<String>,
    /// Date the cheque was issued
    pub issue_date: Option<Date>,
    /// Date the cheque falls due
    pub due_date: Option<Date>,
    /// Free-form description
    pub description: Option<String>,
    /// Whether a settlement has resolved this cheque
    pub is_settled: bool,
    /// Date the settlement took effect
    pub settlement_date: Option<Date>,
    /// Cheque that resolved this one's overspend
    pub settled_by_cheque_id: Option<i64>,
    /// Overspent cheque this cheque was used to settle; set once the cheque is used
    pub settles_cheque_id: Option<i64>,
    /// Supplier payments must be completed by an invoice upload
    pub is_supplier_payment: bool,
    /// Whether the supplier invoice has been uploaded
    pub supplier_invoice_uploaded: bool,
    /// Number of times the cheque has been printed
    pub print_count: i32,
    /// Reason recorded when the cheque was cancelled
    pub cancellation_reason: Option<String>,
    /// Operator who cancelled the cheque
    pub cancelled_by: Option<String>,
    /// When the cheque was cancelled
    pub cancelled_at: Option<DateTimeUtc>,
    /// When the cheque was created
    pub created_at: DateTimeUtc,
    /// Bumped by every guarded mutation of the row
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// A blank cheque has no face amount and no safe.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.amount.is_zero() && self.safe_id.is_none()
    }
}

/// Defines relationships between Cheque and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each cheque optionally belongs to one safe
    #[sea_orm(
        belongs_to = "super::safe::Entity",
        from = "Column::SafeId",
        to = "super::safe::Column::Id"
    )]
    Safe,
    /// One cheque has many expenses
    #[sea_orm(has_many = "super::expense::Entity")]
    Expenses,
}

impl Related<super::safe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Safe.def()
    }
}

impl Related<super::expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(ChequeStatus::Settled.is_terminal());
        assert!(ChequeStatus::Cancelled.is_terminal());

        // Still moves to settled once the invoice arrives
        assert!(!ChequeStatus::SettledPendingInvoice.is_terminal());
        assert!(!ChequeStatus::Assigned.is_terminal());
        assert!(ChequeStatus::SETTLING_POOL.iter().all(|s| !s.is_terminal()));
    }
}
