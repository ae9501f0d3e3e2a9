//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod cheque;
pub mod expense;
pub mod proof_document;
pub mod safe;
pub mod settlement;
pub mod system_state;

// Re-export specific types to avoid conflicts
pub use cheque::{
    ChequeStatus, Column as ChequeColumn, Entity as Cheque, Model as ChequeModel,
};
pub use expense::{Column as ExpenseColumn, Entity as Expense, Model as ExpenseModel};
pub use proof_document::{
    Column as ProofDocumentColumn, Entity as ProofDocument, Model as ProofDocumentModel,
};
pub use safe::{Column as SafeColumn, Entity as Safe, Model as SafeModel};
pub use settlement::{
    Column as SettlementColumn, Entity as Settlement, Model as SettlementModel, SettlementKind,
};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
