/// Cheque cancellation with safe reversal
pub mod cancellation;
/// Cheque book: creation, batches, assignment, and lookups
pub mod cheque;
/// Proof document validation
pub mod documents;
/// Append-only expense ledger
pub mod expense;
/// Amount validation and formatting
pub mod money;
/// Overspend detection
pub mod overspend;
/// Print data, print counting, and the shared print layout
pub mod print;
/// Reconciliation report
pub mod report;
/// Safe accounts and balance movements
pub mod safe;
/// Settlement engine
pub mod settlement;
