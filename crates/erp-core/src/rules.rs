//! # Invoice Type Allow-List
//!
//! Some countries restrict which invoice types a fiscal position may emit,
//! and to whom. In Argentina a Responsable Inscripto issues "A" to other
//! inscriptos and "B" to everyone else; a Monotributista only issues "C".
//!
//! ```text
//! ┌──────────────┐      ┌──────────────┐      ┌──────────────┐
//! │    issuer    │─────►│ invoice type │─────►│   receiver   │
//! │ fiscal pos.  │      │              │      │ fiscal pos.  │
//! └──────────────┘      └──────────────┘      └──────────────┘
//! ```
//!
//! A fiscal position with no rules at all is unrestricted: countries that
//! do not use the allow-list simply leave it empty.

use crate::error::{CoreError, CoreResult};
use crate::types::InvoiceTypeRule;

/// Returns whether `issuer` may emit `invoice_type` to `receiver`.
///
/// ## Example
/// ```rust
/// use erp_core::rules::is_invoice_type_allowed;
/// use erp_core::types::InvoiceTypeRule;
///
/// let rules = vec![InvoiceTypeRule {
///     id: "r1".into(),
///     issuer_fiscal_position_id: "ri".into(),
///     invoice_type_id: "fa".into(),
///     receiver_fiscal_position_id: "ri".into(),
/// }];
///
/// assert!(is_invoice_type_allowed(&rules, "ri", "fa", "ri"));
/// assert!(!is_invoice_type_allowed(&rules, "ri", "fa", "cf"));
/// // No rules for "exento": unrestricted
/// assert!(is_invoice_type_allowed(&rules, "exento", "fa", "cf"));
/// ```
pub fn is_invoice_type_allowed(
    rules: &[InvoiceTypeRule],
    issuer: &str,
    invoice_type: &str,
    receiver: &str,
) -> bool {
    let mut issuer_rules = rules
        .iter()
        .filter(|r| r.issuer_fiscal_position_id == issuer)
        .peekable();

    if issuer_rules.peek().is_none() {
        return true;
    }

    issuer_rules.any(|r| r.invoice_type_id == invoice_type && r.receiver_fiscal_position_id == receiver)
}

/// Like [`is_invoice_type_allowed`], but fails with
/// [`CoreError::InvoiceTypeNotAllowed`].
pub fn check_invoice_type_allowed(
    rules: &[InvoiceTypeRule],
    issuer: &str,
    invoice_type: &str,
    receiver: &str,
) -> CoreResult<()> {
    if is_invoice_type_allowed(rules, issuer, invoice_type, receiver) {
        Ok(())
    } else {
        Err(CoreError::InvoiceTypeNotAllowed {
            issuer_id: issuer.to_string(),
            invoice_type_id: invoice_type.to_string(),
            receiver_id: receiver.to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
