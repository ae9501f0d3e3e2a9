//! Safe business logic - Handles safe creation, lookup, and balance mutations.
//!
//! Balance mutations are always issued as a single `balance = balance + delta` update
//! so concurrent writers never overwrite each other. The mutation helpers accept any
//! `ConnectionTrait` so that callers run them inside the same transaction as the cheque
//! change that triggered them.

use crate::{
    config::settings::SafeConfig,
    core::money,
    entities::{Safe, safe},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Retrieves all active safes, ordered alphabetically by name.
pub async fn get_all_active_safes(db: &DatabaseConnection) -> Result<Vec<safe::Model>> {
    Safe::find()
        .filter(safe::Column::IsActive.eq(true))
        .order_by_asc(safe::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a safe by its unique ID.
pub async fn get_safe_by_id<C>(db: &C, safe_id: i64) -> Result<Option<safe::Model>>
where
    C: ConnectionTrait,
{
    Safe::find_by_id(safe_id).one(db).await.map_err(Into::into)
}

/// Finds a safe by name, including deactivated safes.
pub async fn get_safe_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<safe::Model>> {
    Safe::find()
        .filter(safe::Column::Name.eq(name.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a new active safe whose balance starts at `initial_balance`.
///
/// The name must not be empty. The initial balance may be any signed amount with at
/// most two decimal places, since safes are often opened mid-period.
pub async fn create_safe(
    db: &DatabaseConnection,
    name: String,
    initial_balance: Decimal,
) -> Result<safe::Model> {
    if name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Safe name cannot be empty".to_string(),
        });
    }

    if initial_balance.scale() > money::CURRENCY_SCALE {
        return Err(Error::InvalidAmount {
            amount: initial_balance,
        });
    }

    let safe = safe::ActiveModel {
        name: Set(name.trim().to_string()),
        initial_balance: Set(initial_balance),
        current_balance: Set(initial_balance),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = safe.insert(db).await?;
    info!(safe_id = result.id, name = %result.name, "Created safe");
    Ok(result)
}

/// Deactivates a safe. Its history and balance are kept; it accepts no new cheques.
pub async fn deactivate_safe(db: &DatabaseConnection, safe_id: i64) -> Result<safe::Model> {
    let safe = get_safe_by_id(db, safe_id)
        .await?
        .ok_or_else(|| Error::safe_not_found(safe_id))?;

    let mut active_model: safe::ActiveModel = safe.into();
    active_model.is_active = Set(false);
    let updated = active_model.update(db).await?;
    info!(safe_id, "Deactivated safe");
    Ok(updated)
}

/// Creates every configured safe that does not exist yet. Existing safes are left
/// untouched so that restarts never reset balances.
///
/// # Returns
/// The safes that were created by this call
pub async fn seed_safes(db: &DatabaseConnection, safes: &[SafeConfig]) -> Result<Vec<safe::Model>> {
    let mut created = Vec::new();
    for config in safes {
        if get_safe_by_name(db, &config.name).await?.is_some() {
            debug!(name = %config.name, "Safe already exists, skipping seed");
            continue;
        }
        created.push(create_safe(db, config.name.clone(), config.initial_balance).await?);
    }
    Ok(created)
}

/// Adds a newly assigned cheque's amount to the safe balance.
///
/// # Errors
/// `InvalidAmount` if `amount` is negative.
pub async fn apply_assignment<C>(db: &C, safe_id: i64, amount: Decimal) -> Result<safe::Model>
where
    C: ConnectionTrait,
{
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    update_safe_balance_atomic(db, safe_id, amount).await
}

/// Applies a signed settlement adjustment to the safe balance. Positive values move
/// value into the safe (a replacement cheque), negative values move it out (an early
/// deposit back to the bank).
pub async fn apply_settlement_transfer<C>(
    db: &C,
    safe_id: i64,
    amount: Decimal,
) -> Result<safe::Model>
where
    C: ConnectionTrait,
{
    update_safe_balance_atomic(db, safe_id, amount).await
}

/// Removes a cancelled cheque's amount from the safe balance.
///
/// # Errors
/// `InvalidAmount` if `amount` is negative.
pub async fn apply_cancellation_reversal<C>(
    db: &C,
    safe_id: i64,
    amount: Decimal,
) -> Result<safe::Model>
where
    C: ConnectionTrait,
{
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    update_safe_balance_atomic(db, safe_id, -amount).await
}

/// Updates the balance of a safe by atomically adding a delta:
/// `UPDATE safes SET current_balance = current_balance + delta WHERE id = ?`
///
/// Reading the balance, modifying it, and writing it back would lose updates under
/// concurrent postings, so the arithmetic happens in the database.
async fn update_safe_balance_atomic<C>(db: &C, safe_id: i64, delta: Decimal) -> Result<safe::Model>
where
    C: ConnectionTrait,
{
    let result = Safe::update_many()
        .col_expr(
            safe::Column::CurrentBalance,
            Expr::col(safe::Column::CurrentBalance).add(delta),
        )
        .filter(safe::Column::Id.eq(safe_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::safe_not_found(safe_id));
    }

    let safe = get_safe_by_id(db, safe_id)
        .await?
        .ok_or_else(|| Error::safe_not_found(safe_id))?;
    debug!(safe_id, %delta, balance = %safe.current_balance, "Safe balance updated");
    Ok(safe)
}
