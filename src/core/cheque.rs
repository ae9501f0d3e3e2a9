//! Cheque business logic - creation, batch creation, assignment, and lookups.
//!
//! State transitions are written as guarded single-row updates
//! (`UPDATE cheques SET … WHERE id = ? AND <guard>`). When the update touches no row,
//! the cheque is re-read to report why the guard failed. This keeps every transition
//! atomic even when several operators act on the same cheque.

use crate::{
    core::{money, safe as safe_ops},
    entities::{Cheque, ChequeStatus, cheque},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Input for creating a single blank cheque.
#[derive(Debug, Clone)]
pub struct NewCheque {
    /// Bank account the cheque belongs to
    pub bank_account_id: i64,
    /// Printed cheque number
    pub cheque_number: String,
    /// Optional due date known at creation
    pub due_date: Option<NaiveDate>,
    /// Optional description
    pub description: Option<String>,
}

/// Input for creating a contiguous range of blank cheques.
#[derive(Debug, Clone)]
pub struct ChequeBatch {
    /// Bank account the cheque book belongs to
    pub bank_account_id: i64,
    /// Text placed before every number (e.g. `"CHQ-"`)
    pub prefix: String,
    /// First cheque number, inclusive
    pub start: u64,
    /// Last cheque number, inclusive
    pub end: u64,
}

/// Input for assigning a blank cheque to a safe.
#[derive(Debug, Clone)]
pub struct AssignCheque {
    /// Safe receiving the cheque
    pub safe_id: i64,
    /// Face amount; zero is allowed
    pub amount: Decimal,
    /// Beneficiary, required
    pub issued_to: String,
    /// Date of issue
    pub issue_date: NaiveDate,
    /// Optional due date
    pub due_date: Option<NaiveDate>,
    /// Optional department
    pub department: Option<String>,
    /// Optional description
    pub description: Option<String>,
    /// Whether the cheque pays a supplier and must later be completed by an invoice
    pub is_supplier_payment: bool,
}

/// Finds a cheque by its unique ID.
pub async fn get_cheque_by_id<C>(db: &C, cheque_id: i64) -> Result<Option<cheque::Model>>
where
    C: ConnectionTrait,
{
    Cheque::find_by_id(cheque_id).one(db).await.map_err(Into::into)
}

/// Finds a cheque by its number on a bank account.
pub async fn get_cheque_by_number(
    db: &DatabaseConnection,
    bank_account_id: i64,
    cheque_number: &str,
) -> Result<Option<cheque::Model>> {
    Cheque::find()
        .filter(cheque::Column::BankAccountId.eq(bank_account_id))
        .filter(cheque::Column::ChequeNumber.eq(cheque_number))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves every cheque assigned to a safe, ordered by cheque number.
pub async fn get_cheques_for_safe(
    db: &DatabaseConnection,
    safe_id: i64,
) -> Result<Vec<cheque::Model>> {
    Cheque::find()
        .filter(cheque::Column::SafeId.eq(safe_id))
        .order_by_asc(cheque::Column::ChequeNumber)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves blank cheques still waiting for assignment, optionally for one bank account.
pub async fn get_blank_cheques(
    db: &DatabaseConnection,
    bank_account_id: Option<i64>,
) -> Result<Vec<cheque::Model>> {
    let mut query = Cheque::find()
        .filter(cheque::Column::Status.eq(ChequeStatus::Created))
        .filter(cheque::Column::Amount.eq(Decimal::ZERO))
        .filter(cheque::Column::SafeId.is_null());
    if let Some(bank_account_id) = bank_account_id {
        query = query.filter(cheque::Column::BankAccountId.eq(bank_account_id));
    }
    query
        .order_by_asc(cheque::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads a cheque or fails with `NotFound`.
pub(crate) async fn require_cheque<C>(db: &C, cheque_id: i64) -> Result<cheque::Model>
where
    C: ConnectionTrait,
{
    get_cheque_by_id(db, cheque_id)
        .await?
        .ok_or_else(|| Error::cheque_not_found(cheque_id))
}

/// Creates a single blank cheque.
pub async fn create_cheque(db: &DatabaseConnection, new_cheque: NewCheque) -> Result<cheque::Model> {
    let cheque_number = new_cheque.cheque_number.trim().to_string();
    if cheque_number.is_empty() {
        return Err(Error::Validation {
            message: "Cheque number cannot be empty".to_string(),
        });
    }

    let txn = db.begin().await?;
    ensure_numbers_available(&txn, new_cheque.bank_account_id, &[cheque_number.clone()]).await?;

    let result = insert_blank(
        &txn,
        new_cheque.bank_account_id,
        cheque_number,
        new_cheque.due_date,
        new_cheque.description,
    )
    .await?;
    txn.commit().await?;

    info!(cheque_id = result.id, number = %result.cheque_number, "Created blank cheque");
    Ok(result)
}

/// Creates blank cheques numbered `start..=end` with the given prefix.
///
/// Either every cheque in the range is created or none is.
///
/// # Errors
/// * `InvalidRange` if `end <= start` or the range holds more than `batch_limit` cheques
/// * `DuplicateChequeNumber` if any number already exists on the bank account
#[instrument(skip(db))]
pub async fn create_cheque_batch(
    db: &DatabaseConnection,
    batch: ChequeBatch,
    batch_limit: u64,
) -> Result<Vec<cheque::Model>> {
    if batch.end <= batch.start {
        return Err(Error::InvalidRange {
            start: batch.start,
            end: batch.end,
            reason: "end must be greater than start".to_string(),
        });
    }

    let count = batch
        .end
        .checked_sub(batch.start)
        .and_then(|span| span.checked_add(1))
        .filter(|count| *count <= batch_limit)
        .ok_or_else(|| Error::InvalidRange {
            start: batch.start,
            end: batch.end,
            reason: format!("range exceeds the batch limit of {batch_limit} cheques"),
        })?;

    let numbers: Vec<String> = (batch.start..=batch.end)
        .map(|n| format!("{}{n}", batch.prefix))
        .collect();

    let txn = db.begin().await?;
    ensure_numbers_available(&txn, batch.bank_account_id, &numbers).await?;

    let mut created = Vec::with_capacity(numbers.len());
    for number in numbers {
        created.push(
            insert_blank(&txn, batch.bank_account_id, number, None, None).await?,
        );
    }
    txn.commit().await?;

    info!(
        bank_account_id = batch.bank_account_id,
        count,
        "Created cheque batch"
    );
    Ok(created)
}

/// Assigns a blank cheque to a safe with an amount and beneficiary, adding the amount
/// to the safe balance in the same transaction.
///
/// # Errors
/// * `InvalidAmount` if the amount is negative
/// * `Validation` if `issued_to` is empty
/// * `SafeInactive` / `NotFound` for an unusable safe
/// * `InvalidState` unless the cheque is in `created`
#[instrument(skip(db, assignment), fields(safe_id = assignment.safe_id))]
pub async fn assign_cheque(
    db: &DatabaseConnection,
    cheque_id: i64,
    assignment: AssignCheque,
) -> Result<cheque::Model> {
    let amount = money::ensure_non_negative(assignment.amount)?;
    let issued_to = assignment.issued_to.trim().to_string();
    if issued_to.is_empty() {
        return Err(Error::Validation {
            message: "A cheque must be issued to someone".to_string(),
        });
    }

    let txn = db.begin().await?;

    let safe = safe_ops::get_safe_by_id(&txn, assignment.safe_id)
        .await?
        .ok_or_else(|| Error::safe_not_found(assignment.safe_id))?;
    if !safe.is_active {
        return Err(Error::SafeInactive { safe_id: safe.id });
    }

    let changes = cheque::ActiveModel {
        status: Set(ChequeStatus::Assigned),
        safe_id: Set(Some(safe.id)),
        amount: Set(amount),
        issued_to: Set(Some(issued_to)),
        issue_date: Set(Some(assignment.issue_date)),
        due_date: Set(assignment.due_date),
        department: Set(assignment.department),
        description: Set(assignment.description),
        is_supplier_payment: Set(assignment.is_supplier_payment),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    let result = Cheque::update_many()
        .set(changes)
        .filter(cheque::Column::Id.eq(cheque_id))
        .filter(cheque::Column::Status.eq(ChequeStatus::Created))
        .filter(cheque::Column::IsSettled.eq(false))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        let current = require_cheque(&txn, cheque_id).await?;
        return Err(Error::InvalidState {
            cheque_id,
            message: format!(
                "only blank cheques in 'created' can be assigned (status is {:?})",
                current.status
            ),
        });
    }

    if !amount.is_zero() {
        safe_ops::apply_assignment(&txn, safe.id, amount).await?;
    }

    let assigned = require_cheque(&txn, cheque_id).await?;
    txn.commit().await?;

    info!(cheque_id, %amount, "Assigned cheque to safe");
    Ok(assigned)
}

/// Fails with `DuplicateChequeNumber` for the first number already used on the account.
async fn ensure_numbers_available<C>(db: &C, bank_account_id: i64, numbers: &[String]) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = Cheque::find()
        .filter(cheque::Column::BankAccountId.eq(bank_account_id))
        .filter(cheque::Column::ChequeNumber.is_in(numbers.iter().cloned()))
        .order_by_asc(cheque::Column::ChequeNumber)
        .one(db)
        .await?;

    match existing {
        Some(duplicate) => Err(Error::DuplicateChequeNumber {
            bank_account_id,
            cheque_number: duplicate.cheque_number,
        }),
        None => Ok(()),
    }
}

/// Inserts a blank cheque. A concurrent insert of the same number that slipped past
/// [`ensure_numbers_available`] trips the unique index and is reported as
/// `DuplicateChequeNumber`.
async fn insert_blank<C>(
    db: &C,
    bank_account_id: i64,
    cheque_number: String,
    due_date: Option<NaiveDate>,
    description: Option<String>,
) -> Result<cheque::Model>
where
    C: ConnectionTrait,
{
    blank_cheque(bank_account_id, cheque_number.clone(), due_date, description)
        .insert(db)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Error::DuplicateChequeNumber {
                bank_account_id,
                cheque_number,
            },
            _ => Error::Database(err),
        })
}

fn blank_cheque(
    bank_account_id: i64,
    cheque_number: String,
    due_date: Option<NaiveDate>,
    description: Option<String>,
) -> cheque::ActiveModel {
    let now = Utc::now();
    cheque::ActiveModel {
        cheque_number: Set(cheque_number),
        bank_account_id: Set(bank_account_id),
        amount: Set(Decimal::ZERO),
        status: Set(ChequeStatus::Created),
        safe_id: Set(None),
        issued_to: Set(None),
        department: Set(None),
        issue_date: Set(None),
        due_date: Set(due_date),
        description: Set(description),
        is_settled: Set(false),
        settlement_date: Set(None),
        settled_by_cheque_id: Set(None),
        settles_cheque_id: Set(None),
        is_supplier_payment: Set(false),
        supplier_invoice_uploaded: Set(false),
        print_count: Set(0),
        cancellation_reason: Set(None),
        cancelled_by: Set(None),
        cancelled_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::safe::get_safe_by_id;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn batch(start: u64, end: u64) -> ChequeBatch {
        ChequeBatch {
            bank_account_id: TEST_BANK_ACCOUNT,
            prefix: "CHQ-".to_string(),
            start,
            end,
        }
    }

    #[tokio::test]
    async fn test_batch_range_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_cheque_batch(&db, batch(10, 10), 1000).await;
        assert!(matches!(result, Err(Error::InvalidRange { start: 10, end: 10, .. })));

        let result = create_cheque_batch(&db, batch(10, 5), 1000).await;
        assert!(matches!(result, Err(Error::InvalidRange { .. })));

        let result = create_cheque_batch(&db, batch(1, 1001), 1000).await;
        assert!(matches!(result, Err(Error::InvalidRange { .. })));

        // The whole u64 domain is rejected without overflowing the count
        let result = create_cheque_batch(&db, batch(0, u64::MAX), 1000).await;
        assert!(matches!(
            result,
            Err(Error::InvalidRange { start: 0, end: u64::MAX, .. })
        ));

        let result = create_cheque_batch(&db, batch(0, u64::MAX), u64::MAX).await;
        assert!(matches!(result, Err(Error::InvalidRange { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_batch_creates_blank_range() -> Result<()> {
        let db = setup_test_db().await?;

        let cheques = create_cheque_batch(&db, batch(1, 50), 1000).await?;
        assert_eq!(cheques.len(), 50);
        assert_eq!(cheques[0].cheque_number, "CHQ-1");
        assert_eq!(cheques[49].cheque_number, "CHQ-50");
        assert!(cheques.iter().all(|c| {
            c.status == ChequeStatus::Created
                && c.amount.is_zero()
                && c.safe_id.is_none()
                && c.bank_account_id == TEST_BANK_ACCOUNT
        }));

        let blanks = get_blank_cheques(&db, Some(TEST_BANK_ACCOUNT)).await?;
        assert_eq!(blanks.len(), 50);

        Ok(())
    }

    #[tokio::test]
    async fn test_batch_at_limit_is_accepted() -> Result<()> {
        let db = setup_test_db().await?;

        let cheques = create_cheque_batch(&db, batch(1, 10), 10).await?;
        assert_eq!(cheques.len(), 10);

        Ok(())
    }

    #[tokio::test]
    async fn test_batch_duplicate_is_all_or_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_cheque(&db, "CHQ-25").await?;

        let result = create_cheque_batch(&db, batch(20, 30), 1000).await;
        assert!(matches!(
            result,
            Err(Error::DuplicateChequeNumber { ref cheque_number, .. }) if cheque_number == "CHQ-25"
        ));

        // Nothing from the rejected batch was persisted
        assert!(get_cheque_by_number(&db, TEST_BANK_ACCOUNT, "CHQ-20").await?.is_none());

        // The same numbers are free on another bank account
        let other = ChequeBatch {
            bank_account_id: TEST_BANK_ACCOUNT + 1,
            ..batch(20, 30)
        };
        assert_eq!(create_cheque_batch(&db, other, 1000).await?.len(), 11);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_cheque_duplicate_number() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_cheque(&db, "000123").await?;

        let result = create_test_cheque(&db, "000123").await;
        assert!(matches!(result, Err(Error::DuplicateChequeNumber { .. })));

        let result = create_test_cheque(&db, "  ").await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_unique_index_violation_is_duplicate_number() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_cheque(&db, "CHQ-9").await?;

        // A concurrent creator that already passed the availability check
        let result = insert_blank(&db, TEST_BANK_ACCOUNT, "CHQ-9".to_string(), None, None).await;
        assert!(matches!(
            result,
            Err(Error::DuplicateChequeNumber { bank_account_id: TEST_BANK_ACCOUNT, ref cheque_number })
                if cheque_number == "CHQ-9"
        ));

        let cheque = insert_blank(&db, TEST_BANK_ACCOUNT + 1, "CHQ-9".to_string(), None, None).await?;
        assert_eq!(cheque.bank_account_id, TEST_BANK_ACCOUNT + 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_assign_cheque_updates_safe_balance() -> Result<()> {
        let (db, safe) = setup_with_safe().await?;
        let cheque = create_test_cheque(&db, "C1").await?;

        let assigned =
            assign_cheque(&db, cheque.id, test_assignment(safe.id, dec!(1000))).await?;
        assert_eq!(assigned.status, ChequeStatus::Assigned);
        assert_eq!(assigned.amount, dec!(1000));
        assert_eq!(assigned.safe_id, Some(safe.id));
        assert_eq!(assigned.issued_to.as_deref(), Some("Petty Cash Custodian"));

        let safe = get_safe_by_id(&db, safe.id).await?.unwrap();
        assert_eq!(safe.current_balance, dec!(1000));

        let for_safe = get_cheques_for_safe(&db, safe.id).await?;
        assert_eq!(for_safe, vec![assigned]);

        Ok(())
    }

    #[tokio::test]
    async fn test_assign_cheque_validation() -> Result<()> {
        let (db, safe) = setup_with_safe().await?;
        let cheque = create_test_cheque(&db, "C1").await?;

        let result = assign_cheque(&db, cheque.id, test_assignment(safe.id, dec!(-5))).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let mut no_payee = test_assignment(safe.id, dec!(5));
        no_payee.issued_to = "  ".to_string();
        let result = assign_cheque(&db, cheque.id, no_payee).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = assign_cheque(&db, cheque.id, test_assignment(999, dec!(5))).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "Safe", .. })));

        let result = assign_cheque(&db, 999, test_assignment(safe.id, dec!(5))).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "Cheque", .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_assign_twice_is_invalid_state() -> Result<()> {
        let (db, safe) = setup_with_safe().await?;
        let cheque = create_test_cheque(&db, "C1").await?;

        assign_cheque(&db, cheque.id, test_assignment(safe.id, dec!(100))).await?;
        let result = assign_cheque(&db, cheque.id, test_assignment(safe.id, dec!(100))).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        // The failed second assignment did not touch the balance
        let safe = get_safe_by_id(&db, safe.id).await?.unwrap();
        assert_eq!(safe.current_balance, dec!(100));

        Ok(())
    }

    #[tokio::test]
    async fn test_assign_to_inactive_safe() -> Result<()> {
        let (db, safe) = setup_with_safe().await?;
        crate::core::safe::deactivate_safe(&db, safe.id).await?;
        let cheque = create_test_cheque(&db, "C1").await?;

        let result = assign_cheque(&db, cheque.id, test_assignment(safe.id, dec!(100))).await;
        assert!(matches!(result, Err(Error::SafeInactive { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_assign_zero_amount_leaves_balance() -> Result<()> {
        let (db, safe) = setup_with_safe().await?;
        let cheque = create_test_cheque(&db, "C1").await?;

        let assigned = assign_cheque(&db, cheque.id, test_assignment(safe.id, dec!(0))).await?;
        assert_eq!(assigned.status, ChequeStatus::Assigned);
        assert!(!assigned.is_blank());

        let safe = get_safe_by_id(&db, safe.id).await?.unwrap();
        assert_eq!(safe.current_balance, Decimal::ZERO);

        Ok(())
    }
}
