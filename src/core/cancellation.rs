//! Cheque cancellation with safe reversal.
//!
//! Cancellation is a single guarded update: the cheque row only moves to `cancelled`
//! while it is in a cancellable status, unsettled, and not serving as a settling cheque.
//! A concurrent settlement or a repeated request therefore finds no matching row and is
//! rejected without touching the safe again.

use crate::{
    config::operators::OperatorContext,
    core::{cheque as cheque_ops, expense as expense_ops, safe as safe_ops},
    entities::{Cheque, ChequeStatus, cheque},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Cancels a cheque and reverses any amount it put into its safe.
///
/// # Errors
/// * `Forbidden` without the cancel capability
/// * `Validation` for an empty reason
/// * `InvalidState` if the cheque is settled, has expenses, settles another cheque,
///   or is already cancelled
#[instrument(skip(db, operator), fields(operator = %operator.operator_id))]
pub async fn cancel_cheque(
    db: &DatabaseConnection,
    operator: &OperatorContext,
    cheque_id: i64,
    reason: &str,
) -> Result<cheque::Model> {
    if !operator.can_cancel {
        return Err(Error::Forbidden {
            action: format!("operator '{}' may not cancel cheques", operator.operator_id),
        });
    }
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::Validation {
            message: "Cancellation reason cannot be empty".to_string(),
        });
    }

    let txn = db.begin().await?;
    let now = Utc::now();

    let result = Cheque::update_many()
        .set(cheque::ActiveModel {
            status: Set(ChequeStatus::Cancelled),
            cancellation_reason: Set(Some(reason.to_string())),
            cancelled_by: Set(Some(operator.operator_id.clone())),
            cancelled_at: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(cheque::Column::Id.eq(cheque_id))
        .filter(cheque::Column::Status.is_in(ChequeStatus::CANCELLABLE))
        .filter(cheque::Column::IsSettled.eq(false))
        .filter(cheque::Column::SettlesChequeId.is_null())
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        let current = cheque_ops::require_cheque(&txn, cheque_id).await?;
        return Err(Error::InvalidState {
            cheque_id,
            message: cancellation_rejection(&current),
        });
    }

    let expense_count = expense_ops::count_expenses(&txn, cheque_id).await?;
    if expense_count > 0 {
        return Err(Error::InvalidState {
            cheque_id,
            message: format!("{expense_count} expense(s) have been posted against it"),
        });
    }

    let cancelled = cheque_ops::require_cheque(&txn, cheque_id).await?;
    if let Some(safe_id) = cancelled.safe_id.filter(|_| cancelled.amount > Decimal::ZERO) {
        safe_ops::apply_cancellation_reversal(&txn, safe_id, cancelled.amount).await?;
    }
    txn.commit().await?;

    info!(
        cheque_id,
        amount = %cancelled.amount,
        reason,
        "Cancelled cheque"
    );
    Ok(cancelled)
}

fn cancellation_rejection(current: &cheque::Model) -> String {
    if current.status.is_terminal() {
        format!("cheque is already {:?}", current.status)
    } else if current.is_settled {
        "settled cheques cannot be cancelled".to_string()
    } else if let Some(other) = current.settles_cheque_id {
        format!("cheque settles cheque {other}")
    } else {
        format!("status {:?} cannot be cancelled", current.status)
    }
}
