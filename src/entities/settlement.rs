//! Settlement entity - Audit record of how a cheque was resolved.
//!
//! There is at most one row per settled cheque. The `kind` column selects which of the
//! optional column groups is populated; `core::settlement` folds a row back into a
//! `SettlementResolution`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which settlement path resolved the cheque
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    /// Overspend absorbed by a replacement or matching cheque
    #[sea_orm(string_value = "replacement")]
    Replacement,
    /// Closed early by a verified bank deposit
    #[sea_orm(string_value = "early_deposit")]
    EarlyDeposit,
    /// Supplier payment completed by an invoice upload
    #[sea_orm(string_value = "supplier_invoice")]
    SupplierInvoice,
}

/// Settlement database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    /// Unique identifier for the settlement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The settled cheque
    #[sea_orm(unique)]
    pub cheque_id: i64,
    /// Settlement path
    pub kind: SettlementKind,
    /// Cheque that absorbed the overspend (replacement only)
    pub settling_cheque_id: Option<i64>,
    /// Overspend at the moment of settlement (replacement only)
    pub overspend_amount: Option<Decimal>,
    /// Settling cheque amount minus overspend (replacement only)
    pub residual_amount: Option<Decimal>,
    /// Bank deposit slip number (early deposit only)
    pub deposit_number: Option<String>,
    /// Deposited amount (early deposit only)
    pub deposit_amount: Option<Decimal>,
    /// Date of the deposit (early deposit only)
    pub deposit_date: Option<Date>,
    /// Bank's reference for the deposit
    pub bank_reference: Option<String>,
    /// Operator notes
    pub notes: Option<String>,
    /// When the settlement was committed
    pub settled_at: DateTimeUtc,
}

/// Defines relationships between Settlement and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Proof documents attached to this settlement
    #[sea_orm(has_many = "super::proof_document::Entity")]
    ProofDocuments,
}

impl Related<super::proof_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProofDocuments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
