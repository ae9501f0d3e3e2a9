//! Cheque printing support: print data, print counting, and the shared layout.
//!
//! The layout is a single operator-configured record shared by every cheque, stored
//! as JSON in the `system_state` table.

use crate::{
    core::{cheque as cheque_ops, money},
    entities::{Cheque, ChequeStatus, SystemState, cheque, system_state},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Key of the print layout in `system_state`
pub const PRINT_LAYOUT_KEY: &str = "cheque_print_layout";

const ONES: [&str; 20] = [
    "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen",
    "Nineteen",
];
const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];
const SCALES: [&str; 7] = [
    "",
    "Thousand",
    "Million",
    "Billion",
    "Trillion",
    "Quadrillion",
    "Quintillion",
];

/// Position of one printed field on the cheque leaf, in millimetres from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldPosition {
    /// Horizontal offset
    pub x: f64,
    /// Vertical offset
    pub y: f64,
}

/// Font size and field positions used when printing cheques.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintLayout {
    /// Font size in points
    pub font_size: u32,
    /// Field name to position, e.g. `"amount"`, `"issued_to"`
    pub fields: BTreeMap<String, FieldPosition>,
}

impl Default for PrintLayout {
    fn default() -> Self {
        let fields = [
            ("issue_date", 150.0, 10.0),
            ("issued_to", 20.0, 25.0),
            ("amount_in_words", 20.0, 35.0),
            ("amount", 150.0, 35.0),
        ]
        .into_iter()
        .map(|(name, x, y)| (name.to_string(), FieldPosition { x, y }))
        .collect();

        Self {
            font_size: 12,
            fields,
        }
    }
}

/// Everything printed on a cheque leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChequePrintData {
    /// Cheque number
    pub cheque_number: String,
    /// Face amount
    pub amount: Decimal,
    /// Amount with separators, e.g. `1,250.00`
    pub amount_display: String,
    /// Amount spelled out, e.g. `One Thousand Two Hundred Fifty and 00/100`
    pub amount_in_words: String,
    /// Beneficiary
    pub issued_to: Option<String>,
    /// Issue date
    pub issue_date: Option<NaiveDate>,
    /// Due date
    pub due_date: Option<NaiveDate>,
    /// Times the cheque has already been printed
    pub print_count: i32,
}

/// Spells out a currency amount for the cheque's words line.
#[must_use]
pub fn amount_to_words(amount: Decimal) -> String {
    let rounded = amount.abs().round_dp(money::CURRENCY_SCALE);
    let whole = rounded.trunc().to_u64().unwrap_or_default();
    let cents = (rounded.fract() * Decimal::ONE_HUNDRED)
        .to_u64()
        .unwrap_or_default();

    format!("{} and {cents:02}/100", integer_to_words(whole))
}

fn integer_to_words(mut n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }

    let mut groups = Vec::new();
    let mut scale = 0;
    while n > 0 {
        let chunk = n % 1000;
        if chunk > 0 {
            let mut words = hundreds_to_words(chunk);
            if !SCALES[scale].is_empty() {
                words.push(' ');
                words.push_str(SCALES[scale]);
            }
            groups.push(words);
        }
        n /= 1000;
        scale += 1;
    }

    groups.reverse();
    groups.join(" ")
}

/// Words for 1..=999.
fn hundreds_to_words(n: u64) -> String {
    let mut parts = Vec::new();
    let hundreds = n / 100;
    let rest = n % 100;

    if hundreds > 0 {
        parts.push(format!("{} Hundred", ONES[hundreds as usize]));
    }
    if rest >= 20 {
        let tens = TENS[(rest / 10) as usize];
        match rest % 10 {
            0 => parts.push(tens.to_string()),
            ones => parts.push(format!("{tens}-{}", ONES[ones as usize])),
        }
    } else if rest > 0 {
        parts.push(ONES[rest as usize].to_string());
    }

    parts.join(" ")
}

/// Builds the data printed on an assigned or settled cheque.
///
/// # Errors
/// `InvalidState` for blank or cancelled cheques.
pub async fn cheque_print_data(db: &DatabaseConnection, cheque_id: i64) -> Result<ChequePrintData> {
    let cheque = cheque_ops::require_cheque(db, cheque_id).await?;
    ensure_printable(&cheque)?;

    Ok(ChequePrintData {
        amount_display: money::format_amount(cheque.amount),
        amount_in_words: amount_to_words(cheque.amount),
        cheque_number: cheque.cheque_number,
        amount: cheque.amount,
        issued_to: cheque.issued_to,
        issue_date: cheque.issue_date,
        due_date: cheque.due_date,
        print_count: cheque.print_count,
    })
}

/// Increments a cheque's print count. Reprints stay allowed after settlement.
#[instrument(skip(db))]
pub async fn record_print(db: &DatabaseConnection, cheque_id: i64) -> Result<cheque::Model> {
    let txn = db.begin().await?;

    let result = Cheque::update_many()
        .col_expr(
            cheque::Column::PrintCount,
            Expr::col(cheque::Column::PrintCount).add(1),
        )
        .col_expr(cheque::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cheque::Column::Id.eq(cheque_id))
        .filter(cheque::Column::Status.ne(ChequeStatus::Cancelled))
        .filter(cheque::Column::Amount.gt(Decimal::ZERO))
        .exec(&txn)
        .await?;

    let cheque = cheque_ops::require_cheque(&txn, cheque_id).await?;
    if result.rows_affected == 0 {
        ensure_printable(&cheque)?;
    }
    txn.commit().await?;

    debug!(cheque_id, print_count = cheque.print_count, "Recorded cheque print");
    Ok(cheque)
}

fn ensure_printable(cheque: &cheque::Model) -> Result<()> {
    let message = if cheque.status == ChequeStatus::Cancelled {
        "cancelled cheques cannot be printed"
    } else if cheque.amount <= Decimal::ZERO {
        "cheque has no amount to print"
    } else {
        return Ok(());
    };

    Err(Error::InvalidState {
        cheque_id: cheque.id,
        message: message.to_string(),
    })
}

/// Loads the saved print layout, or `default` if none has been saved.
pub async fn get_print_layout(db: &DatabaseConnection, default: &PrintLayout) -> Result<PrintLayout> {
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(PRINT_LAYOUT_KEY))
        .one(db)
        .await?;

    match state {
        Some(state) => Ok(serde_json::from_str(&state.value)?),
        None => Ok(default.clone()),
    }
}

/// Saves the shared print layout, replacing any previous one.
///
/// # Errors
/// `Validation` for a zero font size.
pub async fn save_print_layout(db: &DatabaseConnection, layout: &PrintLayout) -> Result<()> {
    if layout.font_size == 0 {
        return Err(Error::Validation {
            message: "Font size must be at least 1".to_string(),
        });
    }

    let value = serde_json::to_string(layout)?;
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(PRINT_LAYOUT_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(PRINT_LAYOUT_KEY.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    info!(
        font_size = layout.font_size,
        fields = layout.fields.len(),
        "Saved print layout"
    );
    Ok(())
}
