//! Database configuration module for the cheque ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`
//! so the schema always matches the Rust structs. The composite uniqueness of cheque
//! numbers per bank account cannot be expressed on a single column and is added as a
//! separate index.

use crate::entities::{Cheque, Expense, ProofDocument, Safe, Settlement, SystemState, cheque};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/cheque_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to
/// a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Tables are created parents first so that foreign keys resolve: safes, cheques,
/// expenses, settlements, proof documents, and system state.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    for mut table in [
        schema.create_table_from_entity(Safe),
        schema.create_table_from_entity(Cheque),
        schema.create_table_from_entity(Expense),
        schema.create_table_from_entity(Settlement),
        schema.create_table_from_entity(ProofDocument),
        schema.create_table_from_entity(SystemState),
    ] {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    let cheque_number_index = Index::create()
        .name("idx_unique_cheque_number_per_account")
        .table(Cheque)
        .col(cheque::Column::BankAccountId)
        .col(cheque::Column::ChequeNumber)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&cheque_number_index)).await?;

    info!("Database tables ensured.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        ChequeModel, ExpenseModel, ProofDocumentModel, SafeModel, SettlementModel,
        SystemStateModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<SafeModel> = Safe::find().limit(1).all(&db).await?;
        let _: Vec<ChequeModel> = Cheque::find().limit(1).all(&db).await?;
        let _: Vec<ExpenseModel> = Expense::find().limit(1).all(&db).await?;
        let _: Vec<SettlementModel> = Settlement::find().limit(1).all(&db).await?;
        let _: Vec<ProofDocumentModel> = ProofDocument::find().limit(1).all(&db).await?;
        let _: Vec<SystemStateModel> = SystemState::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
