//! Proof document validation.
//!
//! Uploads are stored by the document store before a settlement is requested; the
//! ledger only receives the store's reference plus metadata. Validation runs before
//! any settlement transaction begins, so a rejected file never holds a cheque row.

use crate::{
    config::settings::DocumentConfig,
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};

/// A document already accepted by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDocument {
    /// Stable reference returned by the store
    pub reference: String,
    /// Original file name
    pub file_name: String,
    /// MIME type, e.g. `"application/pdf"` or `"image/png"`
    pub content_type: String,
    /// Size in bytes
    pub size_bytes: u64,
}

/// Validates one document's reference, type, and size.
///
/// # Errors
/// `InvalidDocument` naming the file and the failed rule.
pub fn validate_document(policy: &DocumentConfig, document: &ProofDocument) -> Result<()> {
    let reject = |reason: String| Error::InvalidDocument {
        file_name: document.file_name.clone(),
        reason,
    };

    if document.reference.trim().is_empty() {
        return Err(reject("document has no store reference".to_string()));
    }

    let kind = normalized_type(&document.content_type);
    if !policy
        .allowed_types
        .iter()
        .any(|allowed| normalized_type(allowed) == kind)
    {
        return Err(reject(format!(
            "type '{}' is not one of {}",
            document.content_type,
            policy.allowed_types.join(", ")
        )));
    }

    if document.size_bytes == 0 {
        return Err(reject("document is empty".to_string()));
    }
    if document.size_bytes > policy.max_size_bytes {
        return Err(reject(format!(
            "{} bytes exceeds the limit of {} bytes",
            document.size_bytes, policy.max_size_bytes
        )));
    }
    stored_size(document)?;

    Ok(())
}

/// Size as stored in the `proof_documents` table.
///
/// # Errors
/// `InvalidDocument` when the size does not fit the column.
pub(crate) fn stored_size(document: &ProofDocument) -> Result<i64> {
    i64::try_from(document.size_bytes).map_err(|_| Error::InvalidDocument {
        file_name: document.file_name.clone(),
        reason: format!("{} bytes cannot be recorded", document.size_bytes),
    })
}

/// Validates a non-empty set of proof documents.
///
/// # Errors
/// `MissingProof` when `documents` is empty, otherwise the first `InvalidDocument`.
pub fn validate_proofs(policy: &DocumentConfig, documents: &[ProofDocument]) -> Result<()> {
    if documents.is_empty() {
        return Err(Error::MissingProof {
            message: "at least one proof document is required".to_string(),
        });
    }
    documents
        .iter()
        .try_for_each(|document| validate_document(policy, document))
}

/// Reduces `"image/JPEG"`, `"jpg"`, and `"jpeg"` to the same key.
fn normalized_type(raw: &str) -> String {
    let subtype = raw.rsplit('/').next().unwrap_or(raw).trim().to_ascii_lowercase();
    match subtype.as_str() {
        "jpg" | "pjpeg" => "jpeg".to_string(),
        _ => subtype,
    }
}
