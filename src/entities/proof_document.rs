//! Proof document entity - Reference to a file held by the document store.
//!
//! Only metadata and the store's stable reference are kept; file bytes never reach
//! the ledger.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Proof document database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proof_documents")]
pub struct Model {
    /// Unique identifier for the document
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Settlement the document supports
    pub settlement_id: i64,
    /// Stable reference returned by the document store
    pub reference: String,
    /// Original file name
    pub file_name: String,
    /// MIME type accepted at upload
    pub content_type: String,
    /// Size in bytes reported by the store
    pub size_bytes: i64,
}

/// Defines relationships between `ProofDocument` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each document belongs to one settlement
    #[sea_orm(
        belongs_to = "super::settlement::Entity",
        from = "Column::SettlementId",
        to = "super::settlement::Column::Id"
    )]
    Settlement,
}

impl Related<super::settlement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settlement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
