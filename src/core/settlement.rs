//! Settlement engine - resolves cheques by replacement, early deposit, or supplier invoice.
//!
//! Every path runs as one database transaction built from guarded updates:
//!
//! 1. Claim the cheque being settled with
//!    `UPDATE cheques SET is_settled = true, … WHERE id = ? AND status = ? AND is_settled = false`.
//!    If two operators race, only one update matches; the other reports `AlreadySettled`.
//! 2. Re-read the expense ledger under that claim and check the overspend rule.
//! 3. For replacements, claim the settling cheque with a second guarded update that only
//!    matches while it is still in the blank pool and unused.
//! 4. Apply the safe transfer and write the settlement record.
//!
//! Any failure drops the transaction, which rolls back every step.

use crate::{
    config::settings::DocumentConfig,
    core::{
        cheque as cheque_ops,
        documents::{self, ProofDocument},
        expense as expense_ops, money,
        overspend::{self, ChequeUsage},
        safe as safe_ops,
    },
    entities::{
        Cheque, ChequeStatus, Expense, ProofDocument as ProofDocumentEntity, Settlement,
        SettlementKind, cheque, proof_document, settlement,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// Bank deposit details for an early settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositDetails {
    /// Deposit slip number
    pub deposit_number: String,
    /// Amount deposited back to the bank
    pub deposit_amount: Decimal,
    /// Date of the deposit, which becomes the settlement date
    pub deposit_date: NaiveDate,
    /// Bank's reference for the deposit
    pub bank_reference: Option<String>,
    /// Operator notes
    pub notes: Option<String>,
}

/// Request to close a cheque early with a verified bank deposit.
#[derive(Debug, Clone)]
pub struct EarlyDeposit {
    /// Deposit details
    pub details: DepositDetails,
    /// Deposit slips or bank confirmations, at least one
    pub proof_documents: Vec<ProofDocument>,
}

/// How a cheque was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementResolution {
    /// Overspend absorbed by another cheque
    Replacement {
        /// Cheque that absorbed the overspend
        settling_cheque_id: i64,
        /// Overspend at the moment of settlement
        overspend: Decimal,
        /// Settling cheque amount minus overspend; zero for a fresh replacement
        residual: Decimal,
    },
    /// Closed early by a bank deposit
    EarlyDeposit(DepositDetails),
    /// Supplier payment completed by its invoice
    SupplierInvoice,
}

/// A settled cheque's permanent audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRecord {
    /// The settled cheque
    pub cheque_id: i64,
    /// When the settlement was committed
    pub settled_at: DateTime<Utc>,
    /// Which path resolved it
    pub resolution: SettlementResolution,
    /// Attached proof documents (deposit slips, invoices)
    pub documents: Vec<ProofDocument>,
}

/// Both sides of a replacement settlement after commit.
#[derive(Debug, Clone)]
pub struct ReplacementOutcome {
    /// The overspent cheque, now settled
    pub settled: cheque::Model,
    /// The cheque that absorbed the overspend
    pub settling: cheque::Model,
    /// Overspend that was resolved
    pub overspend: Decimal,
}

/// Lists cheques that may be drawn as settling cheques: blank, unsettled, in a blank
/// status, never used for another settlement, and without expenses.
pub async fn available_settling_cheques(
    db: &DatabaseConnection,
    bank_account_id: Option<i64>,
) -> Result<Vec<cheque::Model>> {
    let mut query = Cheque::find()
        .filter(cheque::Column::Amount.eq(Decimal::ZERO))
        .filter(cheque::Column::IsSettled.eq(false))
        .filter(cheque::Column::Status.is_in(ChequeStatus::SETTLING_POOL))
        .filter(cheque::Column::SettlesChequeId.is_null());
    if let Some(bank_account_id) = bank_account_id {
        query = query.filter(cheque::Column::BankAccountId.eq(bank_account_id));
    }

    let candidates = query
        .order_by_asc(cheque::Column::Id)
        .find_with_related(Expense)
        .all(db)
        .await?;

    Ok(candidates
        .into_iter()
        .filter(|(_, expenses)| expenses.is_empty())
        .map(|(cheque, _)| cheque)
        .collect())
}

/// Lists assigned, unsettled cheques whose expenses exceed their amount.
pub async fn list_overspent_cheques(
    db: &DatabaseConnection,
) -> Result<Vec<(cheque::Model, ChequeUsage)>> {
    let assigned = Cheque::find()
        .filter(cheque::Column::Status.eq(ChequeStatus::Assigned))
        .filter(cheque::Column::IsSettled.eq(false))
        .order_by_asc(cheque::Column::Id)
        .find_with_related(Expense)
        .all(db)
        .await?;

    Ok(assigned
        .into_iter()
        .filter_map(|(cheque, expenses)| {
            let usage = overspend::usage(&cheque, &expenses);
            usage.is_overspent().then_some((cheque, usage))
        })
        .collect())
}

/// Settles an overspent cheque by drawing a blank cheque for exactly the overspend.
///
/// The settling cheque is assigned to the overspent cheque's safe and beneficiary,
/// its amount set to the overspend, and the overspend is transferred into the safe.
///
/// # Errors
/// * `AlreadySettled` if the overspent cheque was settled first by someone else
/// * `InvalidState` if the overspent cheque is not `assigned`
/// * `NotOverspent` if expenses do not exceed the amount
/// * `SettlingChequeNotEligible` if the settling cheque is not in the blank pool
#[instrument(skip(db))]
pub async fn settle_via_replacement(
    db: &DatabaseConnection,
    overspent_id: i64,
    settling_id: i64,
) -> Result<ReplacementOutcome> {
    if overspent_id == settling_id {
        return Err(Error::SettlingChequeNotEligible {
            cheque_id: settling_id,
            reason: "a cheque cannot settle itself".to_string(),
        });
    }

    let txn = db.begin().await?;
    let today = money::today();

    let (overspent, usage) = claim_overspent(&txn, overspent_id, settling_id, today).await?;
    let safe_id = assigned_safe(&overspent)?;

    let claimed = Cheque::update_many()
        .set(cheque::ActiveModel {
            amount: Set(usage.overspend),
            status: Set(ChequeStatus::Assigned),
            safe_id: Set(Some(safe_id)),
            issued_to: Set(overspent.issued_to.clone()),
            issue_date: Set(Some(today)),
            description: Set(Some(format!(
                "Settlement of cheque {}",
                overspent.cheque_number
            ))),
            settles_cheque_id: Set(Some(overspent_id)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(cheque::Column::Id.eq(settling_id))
        .filter(cheque::Column::Amount.eq(Decimal::ZERO))
        .filter(cheque::Column::IsSettled.eq(false))
        .filter(cheque::Column::Status.is_in(ChequeStatus::SETTLING_POOL))
        .filter(cheque::Column::SettlesChequeId.is_null())
        .exec(&txn)
        .await?;

    if claimed.rows_affected == 0 {
        return Err(settling_rejection(&txn, settling_id).await);
    }
    ensure_unspent(&txn, settling_id).await?;

    safe_ops::apply_settlement_transfer(&txn, safe_id, usage.overspend).await?;

    insert_settlement(
        &txn,
        settlement::ActiveModel {
            cheque_id: Set(overspent_id),
            kind: Set(SettlementKind::Replacement),
            settling_cheque_id: Set(Some(settling_id)),
            overspend_amount: Set(Some(usage.overspend)),
            residual_amount: Set(Some(Decimal::ZERO)),
            ..empty_settlement()
        },
        &[],
    )
    .await?;

    let settled = cheque_ops::require_cheque(&txn, overspent_id).await?;
    let settling = cheque_ops::require_cheque(&txn, settling_id).await?;
    txn.commit().await?;

    info!(
        overspent_id,
        settling_id,
        overspend = %usage.overspend,
        "Settled overspent cheque by replacement"
    );
    Ok(ReplacementOutcome {
        settled,
        settling,
        overspend: usage.overspend,
    })
}

/// Settles an overspent cheque with an already assigned, unspent cheque on the same
/// safe whose amount lies within `tolerance` of the overspend.
///
/// No safe transfer is made because the matching cheque's amount entered the safe when
/// it was assigned. The difference is recorded as the residual.
///
/// # Errors
/// As [`settle_via_replacement`], with `SettlingChequeNotEligible` also covering a
/// different safe, posted expenses, or an amount outside the tolerance.
#[instrument(skip(db))]
pub async fn settle_via_matching_cheque(
    db: &DatabaseConnection,
    tolerance: Decimal,
    overspent_id: i64,
    matching_id: i64,
) -> Result<ReplacementOutcome> {
    if overspent_id == matching_id {
        return Err(Error::SettlingChequeNotEligible {
            cheque_id: matching_id,
            reason: "a cheque cannot settle itself".to_string(),
        });
    }

    let txn = db.begin().await?;
    let today = money::today();

    let (overspent, usage) = claim_overspent(&txn, overspent_id, matching_id, today).await?;

    let matching = cheque_ops::require_cheque(&txn, matching_id).await?;
    let ineligible = |reason: String| Error::SettlingChequeNotEligible {
        cheque_id: matching_id,
        reason,
    };
    if matching.safe_id != overspent.safe_id {
        return Err(ineligible("cheque belongs to a different safe".to_string()));
    }
    if !overspend::within_tolerance(usage.overspend, matching.amount, tolerance) {
        return Err(ineligible(format!(
            "amount {} is not within {} of the overspend {}",
            matching.amount, tolerance, usage.overspend
        )));
    }

    let claimed = Cheque::update_many()
        .set(cheque::ActiveModel {
            settles_cheque_id: Set(Some(overspent_id)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(cheque::Column::Id.eq(matching_id))
        .filter(cheque::Column::Status.eq(ChequeStatus::Assigned))
        .filter(cheque::Column::IsSettled.eq(false))
        .filter(cheque::Column::SettlesChequeId.is_null())
        .exec(&txn)
        .await?;

    if claimed.rows_affected == 0 {
        return Err(settling_rejection(&txn, matching_id).await);
    }
    ensure_unspent(&txn, matching_id).await?;

    let residual = matching.amount - usage.overspend;
    insert_settlement(
        &txn,
        settlement::ActiveModel {
            cheque_id: Set(overspent_id),
            kind: Set(SettlementKind::Replacement),
            settling_cheque_id: Set(Some(matching_id)),
            overspend_amount: Set(Some(usage.overspend)),
            residual_amount: Set(Some(residual)),
            ..empty_settlement()
        },
        &[],
    )
    .await?;

    let settled = cheque_ops::require_cheque(&txn, overspent_id).await?;
    let settling = cheque_ops::require_cheque(&txn, matching_id).await?;
    txn.commit().await?;

    if !residual.is_zero() {
        warn!(overspent_id, matching_id, %residual, "Settled with a near-match residual");
    }
    info!(overspent_id, matching_id, "Settled overspent cheque with matching cheque");
    Ok(ReplacementOutcome {
        settled,
        settling,
        overspend: usage.overspend,
    })
}

/// Closes an assigned cheque that is still within its face value with a verified bank
/// deposit. The deposited amount leaves the safe.
///
/// Documents are validated before the transaction starts.
///
/// # Errors
/// * `InvalidAmount`, `Validation`, `MissingProof`, `InvalidDocument` for bad input
/// * `AlreadySettled` / `InvalidState` for a cheque that cannot be settled
/// * `InvalidState` if the cheque is overspent
#[instrument(skip(db, policy, deposit), fields(deposit_number = %deposit.details.deposit_number))]
pub async fn settle_via_early_deposit(
    db: &DatabaseConnection,
    policy: &DocumentConfig,
    cheque_id: i64,
    deposit: EarlyDeposit,
) -> Result<cheque::Model> {
    let EarlyDeposit {
        details,
        proof_documents,
    } = deposit;
    let deposit_amount = money::ensure_positive(details.deposit_amount)?;
    if details.deposit_number.trim().is_empty() {
        return Err(Error::Validation {
            message: "Deposit number cannot be empty".to_string(),
        });
    }
    documents::validate_proofs(policy, &proof_documents)?;

    let txn = db.begin().await?;

    claim_for_settlement(
        &txn,
        cheque_id,
        ChequeStatus::Assigned,
        cheque::ActiveModel {
            status: Set(ChequeStatus::Settled),
            is_settled: Set(true),
            settlement_date: Set(Some(details.deposit_date)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        },
    )
    .await?;

    let usage = overspend::cheque_usage(&txn, cheque_id).await?;
    if usage.is_overspent() {
        return Err(Error::InvalidState {
            cheque_id,
            message: format!(
                "cheque is overspent by {}; settle it by replacement instead",
                usage.overspend
            ),
        });
    }

    let settled = cheque_ops::require_cheque(&txn, cheque_id).await?;
    let safe_id = assigned_safe(&settled)?;
    safe_ops::apply_settlement_transfer(&txn, safe_id, -deposit_amount).await?;

    insert_settlement(
        &txn,
        settlement::ActiveModel {
            cheque_id: Set(cheque_id),
            kind: Set(SettlementKind::EarlyDeposit),
            deposit_number: Set(Some(details.deposit_number.trim().to_string())),
            deposit_amount: Set(Some(deposit_amount)),
            deposit_date: Set(Some(details.deposit_date)),
            bank_reference: Set(details.bank_reference),
            notes: Set(details.notes),
            ..empty_settlement()
        },
        &proof_documents,
    )
    .await?;
    txn.commit().await?;

    if deposit_amount != usage.remaining {
        warn!(
            cheque_id,
            %deposit_amount,
            remaining = %usage.remaining,
            "Early deposit differs from the cheque's remaining amount"
        );
    }
    info!(cheque_id, %deposit_amount, "Settled cheque by early deposit");
    Ok(settled)
}

/// Moves an assigned supplier-payment cheque to `settled_pending_invoice`.
///
/// # Errors
/// `InvalidState` for cheques that are not assigned supplier payments,
/// `AlreadySettled` for settled cheques.
#[instrument(skip(db))]
pub async fn mark_pending_invoice(db: &DatabaseConnection, cheque_id: i64) -> Result<cheque::Model> {
    let txn = db.begin().await?;

    let result = Cheque::update_many()
        .set(cheque::ActiveModel {
            status: Set(ChequeStatus::SettledPendingInvoice),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(cheque::Column::Id.eq(cheque_id))
        .filter(cheque::Column::Status.eq(ChequeStatus::Assigned))
        .filter(cheque::Column::IsSettled.eq(false))
        .filter(cheque::Column::IsSupplierPayment.eq(true))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        let current = cheque_ops::require_cheque(&txn, cheque_id).await?;
        if !current.is_supplier_payment && !current.is_settled {
            return Err(Error::InvalidState {
                cheque_id,
                message: "only supplier payments wait for an invoice".to_string(),
            });
        }
        return Err(settlement_rejection(&current, ChequeStatus::Assigned));
    }

    let pending = cheque_ops::require_cheque(&txn, cheque_id).await?;
    txn.commit().await?;

    info!(cheque_id, "Supplier payment awaiting invoice");
    Ok(pending)
}

/// Completes a `settled_pending_invoice` supplier payment with its uploaded invoice.
///
/// # Errors
/// `InvalidDocument` for a rejected invoice, `AlreadySettled` if already completed,
/// `InvalidState` if the cheque is not pending an invoice.
#[instrument(skip(db, policy, invoice), fields(file_name = %invoice.file_name))]
pub async fn complete_via_invoice(
    db: &DatabaseConnection,
    policy: &DocumentConfig,
    cheque_id: i64,
    invoice: ProofDocument,
) -> Result<cheque::Model> {
    documents::validate_document(policy, &invoice)?;

    let txn = db.begin().await?;

    claim_for_settlement(
        &txn,
        cheque_id,
        ChequeStatus::SettledPendingInvoice,
        cheque::ActiveModel {
            status: Set(ChequeStatus::Settled),
            is_settled: Set(true),
            supplier_invoice_uploaded: Set(true),
            settlement_date: Set(Some(money::today())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        },
    )
    .await?;

    insert_settlement(
        &txn,
        settlement::ActiveModel {
            cheque_id: Set(cheque_id),
            kind: Set(SettlementKind::SupplierInvoice),
            ..empty_settlement()
        },
        std::slice::from_ref(&invoice),
    )
    .await?;

    let settled = cheque_ops::require_cheque(&txn, cheque_id).await?;
    txn.commit().await?;

    info!(cheque_id, "Supplier payment completed by invoice");
    Ok(settled)
}

/// Retrieves the settlement record of a cheque, if it has been settled.
pub async fn get_settlement(
    db: &DatabaseConnection,
    cheque_id: i64,
) -> Result<Option<SettlementRecord>> {
    let Some(row) = Settlement::find()
        .filter(settlement::Column::ChequeId.eq(cheque_id))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let documents = row
        .find_related(ProofDocumentEntity)
        .order_by_asc(proof_document::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|doc| ProofDocument {
            reference: doc.reference,
            file_name: doc.file_name,
            content_type: doc.content_type,
            size_bytes: u64::try_from(doc.size_bytes).unwrap_or_default(),
        })
        .collect();

    Ok(Some(SettlementRecord {
        cheque_id: row.cheque_id,
        settled_at: row.settled_at,
        resolution: resolution_from_row(&row)?,
        documents,
    }))
}

fn resolution_from_row(row: &settlement::Model) -> Result<SettlementResolution> {
    match row.kind {
        SettlementKind::Replacement => {
            let settling_cheque_id = row.settling_cheque_id.ok_or_else(|| {
                Error::Database(DbErr::Custom(format!(
                    "replacement settlement {} has no settling cheque",
                    row.id
                )))
            })?;
            Ok(SettlementResolution::Replacement {
                settling_cheque_id,
                overspend: row.overspend_amount.unwrap_or_default(),
                residual: row.residual_amount.unwrap_or_default(),
            })
        }
        SettlementKind::EarlyDeposit => Ok(SettlementResolution::EarlyDeposit(DepositDetails {
            deposit_number: row.deposit_number.clone().unwrap_or_default(),
            deposit_amount: row.deposit_amount.unwrap_or_default(),
            deposit_date: row
                .deposit_date
                .unwrap_or_else(|| row.settled_at.date_naive()),
            bank_reference: row.bank_reference.clone(),
            notes: row.notes.clone(),
        })),
        SettlementKind::SupplierInvoice => Ok(SettlementResolution::SupplierInvoice),
    }
}

/// Claims an overspent cheque for a replacement-style settlement and returns it with
/// its usage read under the claim.
async fn claim_overspent(
    txn: &DatabaseTransaction,
    overspent_id: i64,
    settling_id: i64,
    today: NaiveDate,
) -> Result<(cheque::Model, ChequeUsage)> {
    claim_for_settlement(
        txn,
        overspent_id,
        ChequeStatus::Assigned,
        cheque::ActiveModel {
            status: Set(ChequeStatus::Settled),
            is_settled: Set(true),
            settlement_date: Set(Some(today)),
            settled_by_cheque_id: Set(Some(settling_id)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        },
    )
    .await?;

    let usage = overspend::cheque_usage(txn, overspent_id).await?;
    if !usage.is_overspent() {
        return Err(Error::NotOverspent {
            cheque_id: overspent_id,
        });
    }
    let overspent = cheque_ops::require_cheque(txn, overspent_id).await?;
    Ok((overspent, usage))
}

/// Applies `changes` to the cheque only while it is unsettled and in `required`.
async fn claim_for_settlement(
    txn: &DatabaseTransaction,
    cheque_id: i64,
    required: ChequeStatus,
    changes: cheque::ActiveModel,
) -> Result<()> {
    let result = Cheque::update_many()
        .set(changes)
        .filter(cheque::Column::Id.eq(cheque_id))
        .filter(cheque::Column::Status.eq(required))
        .filter(cheque::Column::IsSettled.eq(false))
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        let current = cheque_ops::require_cheque(txn, cheque_id).await?;
        return Err(settlement_rejection(&current, required));
    }
    Ok(())
}

/// Explains why a cheque could not be claimed for settlement.
fn settlement_rejection(current: &cheque::Model, required: ChequeStatus) -> Error {
    if current.is_settled || current.status == ChequeStatus::Settled {
        Error::AlreadySettled {
            cheque_id: current.id,
        }
    } else if current.status.is_terminal() {
        Error::InvalidState {
            cheque_id: current.id,
            message: format!("cheque is {:?} and cannot be settled", current.status),
        }
    } else {
        Error::InvalidState {
            cheque_id: current.id,
            message: format!(
                "settlement requires status {required:?} (status is {:?})",
                current.status
            ),
        }
    }
}

/// Explains why a settling cheque could not be claimed.
async fn settling_rejection(txn: &DatabaseTransaction, cheque_id: i64) -> Error {
    let current = match cheque_ops::require_cheque(txn, cheque_id).await {
        Ok(current) => current,
        Err(e) => return e,
    };

    let reason = if let Some(other) = current.settles_cheque_id {
        format!("already used to settle cheque {other}")
    } else if current.is_settled {
        "cheque is settled".to_string()
    } else if !current.amount.is_zero() && current.status != ChequeStatus::Assigned {
        format!("cheque already carries {}", current.amount)
    } else {
        format!("status {:?} is not eligible", current.status)
    };
    Error::SettlingChequeNotEligible { cheque_id, reason }
}

/// Rejects settling cheques that have expenses posted against them.
async fn ensure_unspent(txn: &DatabaseTransaction, cheque_id: i64) -> Result<()> {
    if expense_ops::count_expenses(txn, cheque_id).await? > 0 {
        return Err(Error::SettlingChequeNotEligible {
            cheque_id,
            reason: "expenses have been posted against it".to_string(),
        });
    }
    Ok(())
}

fn assigned_safe(cheque: &cheque::Model) -> Result<i64> {
    cheque.safe_id.ok_or_else(|| Error::InvalidState {
        cheque_id: cheque.id,
        message: "cheque is not assigned to a safe".to_string(),
    })
}

fn empty_settlement() -> settlement::ActiveModel {
    settlement::ActiveModel {
        settling_cheque_id: Set(None),
        overspend_amount: Set(None),
        residual_amount: Set(None),
        deposit_number: Set(None),
        deposit_amount: Set(None),
        deposit_date: Set(None),
        bank_reference: Set(None),
        notes: Set(None),
        settled_at: Set(Utc::now()),
        ..Default::default()
    }
}

async fn insert_settlement(
    txn: &DatabaseTransaction,
    record: settlement::ActiveModel,
    proofs: &[ProofDocument],
) -> Result<settlement::Model> {
    let record = record.insert(txn).await?;

    for proof in proofs {
        proof_document::ActiveModel {
            settlement_id: Set(record.id),
            reference: Set(proof.reference.clone()),
            file_name: Set(proof.file_name.clone()),
            content_type: Set(proof.content_type.clone()),
            size_bytes: Set(documents::stored_size(proof)?),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }

    Ok(record)
}
