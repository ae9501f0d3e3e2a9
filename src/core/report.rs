//! Reconciliation reporting.
//!
//! Builds a snapshot of every active safe and every overspent cheque, computed fresh
//! from the expense ledger, and formats it as plain text for logs or export.

use crate::{
    core::{
        cheque as cheque_ops, money,
        overspend::{self, ChequeUsage},
        safe as safe_ops, settlement,
    },
    entities::{Cheque, ChequeStatus, Expense, cheque, safe},
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, prelude::*};
use std::fmt::Write;

/// Position of one safe at report time.
#[derive(Debug, Clone)]
pub struct SafeSummary {
    /// The safe being reported on
    pub safe: safe::Model,
    /// Open (assigned, unsettled) cheques drawn on the safe
    pub open_cheques: usize,
    /// Face amount of the open cheques
    pub assigned_amount: Decimal,
    /// Expenses posted against the open cheques
    pub total_expenses: Decimal,
    /// Unspent face amount still available on open cheques
    pub outstanding: Decimal,
    /// Open cheques that are overspent
    pub overspent_cheques: usize,
}

/// Full reconciliation snapshot.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    /// Date the report was generated
    pub generated_on: NaiveDate,
    /// One summary per active safe
    pub safes: Vec<SafeSummary>,
    /// Overspent cheques awaiting settlement
    pub overspent: Vec<(cheque::Model, ChequeUsage)>,
    /// Sum of active safe balances
    pub total_balance: Decimal,
    /// Sum of overspend awaiting settlement
    pub total_overspend: Decimal,
    /// Blank cheques available for assignment or settlement
    pub blank_cheques: usize,
}

/// Generates the reconciliation report.
pub async fn generate_reconciliation_report(
    db: &DatabaseConnection,
) -> Result<ReconciliationReport> {
    let safes = safe_ops::get_all_active_safes(db).await?;

    let mut summaries = Vec::with_capacity(safes.len());
    for safe in safes {
        summaries.push(summarize_safe(db, safe).await?);
    }

    let overspent = settlement::list_overspent_cheques(db).await?;
    let blank_cheques = cheque_ops::get_blank_cheques(db, None).await?.len();

    Ok(ReconciliationReport {
        generated_on: money::today(),
        total_balance: money::total(summaries.iter().map(|s| s.safe.current_balance)),
        total_overspend: money::total(overspent.iter().map(|(_, usage)| usage.overspend)),
        safes: summaries,
        overspent,
        blank_cheques,
    })
}

async fn summarize_safe(db: &DatabaseConnection, safe: safe::Model) -> Result<SafeSummary> {
    let open = Cheque::find()
        .filter(cheque::Column::SafeId.eq(safe.id))
        .filter(cheque::Column::Status.eq(ChequeStatus::Assigned))
        .filter(cheque::Column::IsSettled.eq(false))
        .order_by_asc(cheque::Column::Id)
        .find_with_related(Expense)
        .all(db)
        .await?;

    let usages: Vec<ChequeUsage> = open
        .iter()
        .map(|(cheque, expenses)| overspend::usage(cheque, expenses))
        .collect();

    Ok(SafeSummary {
        safe,
        open_cheques: usages.len(),
        assigned_amount: money::total(usages.iter().map(|u| u.amount)),
        total_expenses: money::total(usages.iter().map(|u| u.total_expenses)),
        outstanding: money::total(usages.iter().map(|u| u.remaining.max(Decimal::ZERO))),
        overspent_cheques: usages.iter().filter(|u| u.is_overspent()).count(),
    })
}

/// Percentage of assigned money that has been spent, 0 when nothing is assigned.
#[must_use]
pub fn utilization_percent(assigned: Decimal, spent: Decimal) -> Decimal {
    if assigned.is_zero() {
        return Decimal::ZERO;
    }
    (spent / assigned * Decimal::ONE_HUNDRED).round_dp(1)
}

/// Formats the report as plain text.
#[must_use]
pub fn format_report(report: &ReconciliationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reconciliation report for {}", report.generated_on);
    let _ = writeln!(out);

    if report.safes.is_empty() {
        let _ = writeln!(out, "No active safes.");
    }
    for summary in &report.safes {
        let _ = writeln!(
            out,
            "{}: balance {} | {} open cheque(s) totalling {} | spent {} ({}%) | outstanding {}",
            summary.safe.name,
            money::format_amount(summary.safe.current_balance),
            summary.open_cheques,
            money::format_amount(summary.assigned_amount),
            money::format_amount(summary.total_expenses),
            utilization_percent(summary.assigned_amount, summary.total_expenses),
            money::format_amount(summary.outstanding),
        );
    }

    let _ = writeln!(out);
    if report.overspent.is_empty() {
        let _ = writeln!(out, "No overspent cheques.");
    } else {
        let _ = writeln!(out, "Overspent cheques awaiting settlement:");
        for (cheque, usage) in &report.overspent {
            let _ = writeln!(
                out,
                "  {} | amount {} | spent {} | overspent by {}",
                cheque.cheque_number,
                money::format_amount(usage.amount),
                money::format_amount(usage.total_expenses),
                money::format_amount(usage.overspend),
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Total safe balance: {}",
        money::format_amount(report.total_balance)
    );
    let _ = writeln!(
        out,
        "Total overspend: {}",
        money::format_amount(report.total_overspend)
    );
    let _ = write!(out, "Blank cheques available: {}", report.blank_cheques);
    out
}
