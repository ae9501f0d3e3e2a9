//! Shared test utilities for the cheque ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test safes, cheques, and expenses with sensible defaults.

use crate::{
    core::{
        cheque::{self, AssignCheque, NewCheque},
        documents::ProofDocument,
        expense::{self, EXPENSE_STATUS_POSTED, NewExpense},
        money, safe,
    },
    entities,
    errors::Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Bank account used by every test cheque
pub const TEST_BANK_ACCOUNT: i64 = 1;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a safe with a custom name and opening balance.
pub async fn create_custom_safe(
    db: &DatabaseConnection,
    name: &str,
    initial_balance: Decimal,
) -> Result<entities::safe::Model> {
    safe::create_safe(db, name.to_string(), initial_balance).await
}

/// Sets up a test environment with an empty safe named `"Test Safe"`.
pub async fn setup_with_safe() -> Result<(DatabaseConnection, entities::safe::Model)> {
    let db = setup_test_db().await?;
    let safe = create_custom_safe(&db, "Test Safe", Decimal::ZERO).await?;
    Ok((db, safe))
}

/// Creates a blank cheque on [`TEST_BANK_ACCOUNT`].
pub async fn create_test_cheque(
    db: &DatabaseConnection,
    cheque_number: &str,
) -> Result<entities::cheque::Model> {
    cheque::create_cheque(
        db,
        NewCheque {
            bank_account_id: TEST_BANK_ACCOUNT,
            cheque_number: cheque_number.to_string(),
            due_date: None,
            description: None,
        },
    )
    .await
}

/// Assignment of `amount` to a safe, issued today to `"Petty Cash Custodian"`.
#[must_use]
pub fn test_assignment(safe_id: i64, amount: Decimal) -> AssignCheque {
    AssignCheque {
        safe_id,
        amount,
        issued_to: "Petty Cash Custodian".to_string(),
        issue_date: money::today(),
        due_date: None,
        department: None,
        description: None,
        is_supplier_payment: false,
    }
}

/// Sets up a safe with cheque `"CHQ-1"` assigned to it for `amount`.
/// Returns (db, safe, cheque); the safe balance equals `amount`.
pub async fn setup_with_assigned_cheque(
    amount: Decimal,
) -> Result<(
    DatabaseConnection,
    entities::safe::Model,
    entities::cheque::Model,
)> {
    let (db, safe) = setup_with_safe().await?;
    let blank = create_test_cheque(&db, "CHQ-1").await?;
    let cheque = cheque::assign_cheque(&db, blank.id, test_assignment(safe.id, amount)).await?;
    let safe = safe::get_safe_by_id(&db, safe.id)
        .await?
        .ok_or_else(|| crate::errors::Error::safe_not_found(safe.id))?;
    Ok((db, safe, cheque))
}

/// Expense of `amount` described as `"Test expense"`.
#[must_use]
pub fn test_expense(amount: Decimal) -> NewExpense {
    NewExpense {
        amount,
        category_id: None,
        description: "Test expense".to_string(),
        paid_to: None,
    }
}

/// Posts a [`test_expense`] against a cheque.
pub async fn post_test_expense(
    db: &DatabaseConnection,
    cheque_id: i64,
    amount: Decimal,
) -> Result<entities::expense::Model> {
    expense::post_expense(db, cheque_id, test_expense(amount)).await
}

/// Assigned cheque model for pure calculations, no database involved.
#[must_use]
pub fn cheque_model(id: i64, amount: Decimal) -> entities::cheque::Model {
    let now = Utc::now();
    entities::cheque::Model {
        id,
        cheque_number: format!("CHQ-{id}"),
        bank_account_id: TEST_BANK_ACCOUNT,
        amount,
        status: entities::ChequeStatus::Assigned,
        safe_id: Some(1),
        issued_to: Some("Petty Cash Custodian".to_string()),
        department: None,
        issue_date: Some(now.date_naive()),
        due_date: None,
        description: None,
        is_settled: false,
        settlement_date: None,
        settled_by_cheque_id: None,
        settles_cheque_id: None,
        is_supplier_payment: false,
        supplier_invoice_uploaded: false,
        print_count: 0,
        cancellation_reason: None,
        cancelled_by: None,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Posted expense model for pure calculations, no database involved.
#[must_use]
pub fn expense_model(id: i64, cheque_id: i64, amount: Decimal) -> entities::expense::Model {
    entities::expense::Model {
        id,
        cheque_id,
        category_id: None,
        amount,
        description: "Test expense".to_string(),
        paid_to: None,
        expense_date: Utc::now(),
        status: EXPENSE_STATUS_POSTED.to_string(),
    }
}

/// A valid one-kilobyte PDF proof document.
#[must_use]
pub fn test_document(file_name: &str) -> ProofDocument {
    ProofDocument {
        reference: format!("store://{file_name}"),
        file_name: file_name.to_string(),
        content_type: "application/pdf".to_string(),
        size_bytes: 1024,
    }
}
