//! # Document Totals
//!
//! Line and document arithmetic shared by invoices, quotations and sales.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per line                                                               │
//! │    gross_before_discount = unit_price × quantity                       │
//! │    net   = gross_before_discount − round(… × discount)                 │
//! │    vat   = round(net × vat_rate)                                        │
//! │    gross = net + vat                                                    │
//! │                                                                         │
//! │  Per document                                                           │
//! │    subtotal  = Σ net                                                    │
//! │    vat_total = Σ vat                                                    │
//! │    total     = subtotal + vat_total                                     │
//! │    breakdown = per VAT id: Σ net (base), Σ vat (amount)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! VAT is rounded per line, so the breakdown always adds up to `vat_total`.
//! Every computed amount must stay within ±[`MAX_TOTAL_CENTS`]; anything
//! beyond is reported as `ValidationError::OutOfRange` for the field that
//! overflowed.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::{Fraction, Money};
use crate::validation::{ValidationResult, MAX_TOTAL_CENTS};

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: -MAX_TOTAL_CENTS,
        max: MAX_TOTAL_CENTS,
    }
}

/// Rejects `None` (arithmetic overflow) and amounts past the total limit.
fn bounded(field: &str, amount: Option<Money>) -> ValidationResult<Money> {
    match amount {
        Some(m) if m.cents().abs() <= MAX_TOTAL_CENTS => Ok(m),
        _ => Err(out_of_range(field)),
    }
}

// =============================================================================
// Line Amounts
// =============================================================================

/// Computed amounts of one document line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    /// After discount, before VAT.
    pub net: Money,
    pub vat: Money,
    /// `net + vat`.
    pub gross: Money,
}

impl LineAmounts {
    /// ## Example
    /// ```rust
    /// use erp_core::money::{Fraction, Money};
    /// use erp_core::totals::LineAmounts;
    ///
    /// // 3 × 10.00, 10 % off, 21 % VAT
    /// let line = LineAmounts::compute(
    ///     Money::from_cents(1000),
    ///     3,
    ///     Fraction::from_bps(1000),
    ///     Fraction::from_bps(2100),
    /// )
    /// .unwrap();
    /// assert_eq!(line.net.cents(), 2700);
    /// assert_eq!(line.vat.cents(), 567);
    /// assert_eq!(line.gross.cents(), 3267);
    /// ```
    pub fn compute(
        unit_price: Money,
        quantity: i64,
        discount: Fraction,
        vat_rate: Fraction,
    ) -> ValidationResult<Self> {
        let before_discount = bounded("line_total", unit_price.checked_multiply_quantity(quantity))?;
        let net = bounded("line_total", before_discount.apply_discount(discount))?;
        let vat = bounded("line_vat", net.calculate_tax(vat_rate))?;
        let gross = bounded("line_total", net.checked_add(vat))?;
        Ok(LineAmounts { net, vat, gross })
    }
}

// =============================================================================
// Document Totals
// =============================================================================

/// Taxable base and VAT amount for one VAT rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatSubtotal {
    pub vat_id: String,
    pub base: Money,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub vat_total: Money,
    pub total: Money,
    /// One entry per VAT id, in order of first appearance.
    pub vat_breakdown: Vec<VatSubtotal>,
}

impl DocumentTotals {
    /// Folds `(vat_id, amounts)` pairs into document totals.
    pub fn from_lines<I, S>(lines: I) -> ValidationResult<Self>
    where
        I: IntoIterator<Item = (S, LineAmounts)>,
        S: AsRef<str>,
    {
        let mut totals = DocumentTotals::default();

        for (vat_id, amounts) in lines {
            totals.subtotal = bounded("subtotal", totals.subtotal.checked_add(amounts.net))?;
            totals.vat_total = bounded("vat_total", totals.vat_total.checked_add(amounts.vat))?;

            let vat_id = vat_id.as_ref();
            match totals.vat_breakdown.iter_mut().find(|s| s.vat_id == vat_id) {
                Some(entry) => {
                    // bounded by subtotal and vat_total above
                    entry.base += amounts.net;
                    entry.amount += amounts.vat;
                }
                None => totals.vat_breakdown.push(VatSubtotal {
                    vat_id: vat_id.to_string(),
                    base: amounts.net,
                    amount: amounts.vat,
                }),
            }
        }

        totals.total = bounded("total", totals.subtotal.checked_add(totals.vat_total))?;
        Ok(totals)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
