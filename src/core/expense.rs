//! Expense ledger - Records money spent against a cheque.
//!
//! The ledger is the single source of truth for how much of a cheque has been used.
//! Posting an expense first touches the cheque row with a guarded update, which both
//! validates the cheque state and serializes the posting against concurrent
//! cancellation or settlement of the same cheque.

use crate::{
    core::{cheque as cheque_ops, money, overspend},
    entities::{Cheque, ChequeStatus, Expense, cheque, expense},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// Status stored on every expense posted through this module.
pub const EXPENSE_STATUS_POSTED: &str = "posted";

/// Input for posting an expense against a cheque.
#[derive(Debug, Clone)]
pub struct NewExpense {
    /// Amount spent, must be positive
    pub amount: Decimal,
    /// Optional category from the category registry
    pub category_id: Option<i64>,
    /// What the money was spent on
    pub description: String,
    /// Who was paid
    pub paid_to: Option<String>,
}

/// Posts an expense against an assigned cheque.
///
/// The cheque status never changes here; overspend is derived from the ledger on read.
///
/// # Errors
/// * `InvalidAmount` if the amount is not positive
/// * `NotFound` if the cheque does not exist
/// * `InvalidState` unless the cheque is `assigned` and unsettled
#[instrument(skip(db, new_expense), fields(amount = %new_expense.amount))]
pub async fn post_expense(
    db: &DatabaseConnection,
    cheque_id: i64,
    new_expense: NewExpense,
) -> Result<expense::Model> {
    let amount = money::ensure_positive(new_expense.amount)?;

    let txn = db.begin().await?;

    // Guarded touch: locks the cheque row and proves it can still accrue expenses
    let touched = Cheque::update_many()
        .set(cheque::ActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(cheque::Column::Id.eq(cheque_id))
        .filter(cheque::Column::Status.eq(ChequeStatus::Assigned))
        .filter(cheque::Column::IsSettled.eq(false))
        .exec(&txn)
        .await?;

    if touched.rows_affected == 0 {
        let current = cheque_ops::require_cheque(&txn, cheque_id).await?;
        return Err(Error::InvalidState {
            cheque_id,
            message: format!(
                "expenses can only be posted against assigned, unsettled cheques (status is {:?})",
                current.status
            ),
        });
    }

    let expense_model = expense::ActiveModel {
        cheque_id: Set(cheque_id),
        category_id: Set(new_expense.category_id),
        amount: Set(amount),
        description: Set(new_expense.description.trim().to_string()),
        paid_to: Set(new_expense.paid_to),
        expense_date: Set(Utc::now()),
        status: Set(EXPENSE_STATUS_POSTED.to_string()),
        ..Default::default()
    };
    let result = expense_model.insert(&txn).await?;

    let cheque = cheque_ops::require_cheque(&txn, cheque_id).await?;
    let usage = overspend::usage(&cheque, &get_expenses_for_cheque(&txn, cheque_id).await?);
    txn.commit().await?;

    info!(cheque_id, expense_id = result.id, "Posted expense");
    if usage.is_overspent() {
        warn!(
            cheque_id,
            overspend = %usage.overspend,
            "Cheque is overspent and needs settlement"
        );
    }
    Ok(result)
}

/// Retrieves all expenses for a cheque, newest first.
pub async fn get_expenses_for_cheque<C>(db: &C, cheque_id: i64) -> Result<Vec<expense::Model>>
where
    C: ConnectionTrait,
{
    Expense::find()
        .filter(expense::Column::ChequeId.eq(cheque_id))
        .order_by_desc(expense::Column::ExpenseDate)
        .order_by_desc(expense::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific expense by its unique ID.
pub async fn get_expense_by_id(
    db: &DatabaseConnection,
    expense_id: i64,
) -> Result<Option<expense::Model>> {
    Expense::find_by_id(expense_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Sums every expense posted against a cheque, read fresh from the ledger.
pub async fn total_expenses<C>(db: &C, cheque_id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let expenses = get_expenses_for_cheque(db, cheque_id).await?;
    Ok(money::total(expenses.iter().map(|e| e.amount)))
}

/// Counts the expenses posted against a cheque.
pub async fn count_expenses<C>(db: &C, cheque_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    Expense::find()
        .filter(expense::Column::ChequeId.eq(cheque_id))
        .count(db)
        .await
        .map_err(Into::into)
}
