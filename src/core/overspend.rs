//! Overspend detection - pure reads over a cheque and its expenses.
//!
//! Nothing here is cached. Every figure is recomputed from the expense rows passed in,
//! so it cannot drift from the ledger.

use crate::{
    core::{cheque as cheque_ops, expense as expense_ops, money},
    entities::{cheque, expense},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;

/// How much of a cheque's face amount has been used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChequeUsage {
    /// Face amount of the cheque
    pub amount: Decimal,
    /// Sum of every expense posted against the cheque
    pub total_expenses: Decimal,
    /// `amount - total_expenses`, negative when overspent
    pub remaining: Decimal,
    /// `max(0, total_expenses - amount)`
    pub overspend: Decimal,
}

impl ChequeUsage {
    /// True when spending exceeds the face amount.
    #[must_use]
    pub fn is_overspent(&self) -> bool {
        self.overspend > Decimal::ZERO
    }

    /// True when spending equals the face amount exactly.
    #[must_use]
    pub fn is_fully_used(&self) -> bool {
        self.total_expenses == self.amount
    }
}

/// Sum of expenses beyond the cheque amount, never negative.
#[must_use]
pub fn overspend(cheque: &cheque::Model, expenses: &[expense::Model]) -> Decimal {
    (spent(expenses) - cheque.amount).max(Decimal::ZERO)
}

/// Cheque amount minus expenses; negative values represent overspend.
#[must_use]
pub fn remaining(cheque: &cheque::Model, expenses: &[expense::Model]) -> Decimal {
    cheque.amount - spent(expenses)
}

/// Exact equality between expenses and cheque amount, no tolerance.
#[must_use]
pub fn is_fully_used(cheque: &cheque::Model, expenses: &[expense::Model]) -> bool {
    spent(expenses) == cheque.amount
}

/// Computes every usage figure at once.
#[must_use]
pub fn usage(cheque: &cheque::Model, expenses: &[expense::Model]) -> ChequeUsage {
    let total_expenses = spent(expenses);
    ChequeUsage {
        amount: cheque.amount,
        total_expenses,
        remaining: cheque.amount - total_expenses,
        overspend: (total_expenses - cheque.amount).max(Decimal::ZERO),
    }
}

/// Whether a candidate amount lies within `tolerance` of an overspend.
#[must_use]
pub fn within_tolerance(overspend: Decimal, candidate: Decimal, tolerance: Decimal) -> bool {
    (candidate - overspend).abs() <= tolerance
}

/// Loads a cheque and its expenses and computes its usage.
pub async fn cheque_usage<C>(db: &C, cheque_id: i64) -> Result<ChequeUsage>
where
    C: ConnectionTrait,
{
    let cheque = cheque_ops::require_cheque(db, cheque_id).await?;
    let expenses = expense_ops::get_expenses_for_cheque(db, cheque_id).await?;
    Ok(usage(&cheque, &expenses))
}

fn spent(expenses: &[expense::Model]) -> Decimal {
    money::total(expenses.iter().map(|e| e.amount))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::Error;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    fn expenses(amounts: &[Decimal]) -> Vec<expense::Model> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| expense_model(i64::try_from(i).unwrap() + 1, 1, *amount))
            .collect()
    }

    #[test]
    fn test_within_face_value() {
        let cheque = cheque_model(1, dec!(1000));
        let spent = expenses(&[dec!(300), dec!(200)]);

        assert_eq!(remaining(&cheque, &spent), dec!(500));
        assert_eq!(overspend(&cheque, &spent), Decimal::ZERO);
        assert!(!is_fully_used(&cheque, &spent));
        assert!(!usage(&cheque, &spent).is_overspent());
    }

    #[test]
    fn test_overspent() {
        let cheque = cheque_model(1, dec!(1000));
        let spent = expenses(&[dec!(1200)]);

        let usage = usage(&cheque, &spent);
        assert_eq!(usage.remaining, dec!(-200));
        assert_eq!(usage.overspend, dec!(200));
        assert_eq!(usage.total_expenses, dec!(1200));
        assert!(usage.is_overspent());
        assert!(!usage.is_fully_used());
    }

    #[test]
    fn test_fully_used_is_exact() {
        let cheque = cheque_model(1, dec!(100));

        assert!(is_fully_used(&cheque, &expenses(&[dec!(60), dec!(40)])));
        assert!(!is_fully_used(&cheque, &expenses(&[dec!(60), dec!(39.99)])));
        assert!(!is_fully_used(&cheque, &expenses(&[dec!(60), dec!(40.01)])));
    }

    #[test]
    fn test_no_expenses() {
        let cheque = cheque_model(1, dec!(0));

        assert_eq!(remaining(&cheque, &[]), Decimal::ZERO);
        assert_eq!(overspend(&cheque, &[]), Decimal::ZERO);
        assert!(is_fully_used(&cheque, &[]));
    }

    #[test]
    fn test_within_tolerance() {
        assert!(within_tolerance(dec!(200), dec!(200), dec!(0)));
        assert!(within_tolerance(dec!(200), dec!(210), dec!(10)));
        assert!(within_tolerance(dec!(200), dec!(190), dec!(10)));
        assert!(!within_tolerance(dec!(200), dec!(210.01), dec!(10)));
    }

    #[tokio::test]
    async fn test_cheque_usage_reads_fresh_from_ledger() -> Result<()> {
        let (db, _safe, cheque) = setup_with_assigned_cheque(dec!(1000)).await?;

        let before = cheque_usage(&db, cheque.id).await?;
        assert_eq!(before.remaining, dec!(1000));

        post_test_expense(&db, cheque.id, dec!(1200)).await?;

        let after = cheque_usage(&db, cheque.id).await?;
        assert_eq!(after.remaining, dec!(-200));
        assert_eq!(after.overspend, dec!(200));

        let missing = cheque_usage(&db, 999).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));

        Ok(())
    }
}
