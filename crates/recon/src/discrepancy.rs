//! Discrepancy detection — compares an extracted invoice against its matched
//! PO and emits typed, severity-tagged findings.

use std::collections::HashMap;

use crate::config::ReconConfig;
use crate::ledger::{PoLedger, PoLineItem, PurchaseOrder};
use crate::model::{
    Discrepancy, DiscrepancyKind, ExtractedInvoice, MatchingResult, Severity,
};

/// Total variance above this fraction of the PO total is high severity.
const HIGH_TOTAL_VARIANCE: f64 = 0.10;

/// Findings for one invoice, plus the aggregate variance figures.
///
/// The aggregates are raw: they are populated whenever a PO resolved, even
/// when the variance sits below the emission gates.
#[derive(Debug, Clone)]
pub struct DiscrepancyReport {
    pub discrepancies: Vec<Discrepancy>,
    pub total_variance_amount: f64,
    pub total_variance_percentage: f64,
    pub reasoning: String,
}

/// Detect discrepancies between `invoice` and the PO resolved in `matching`.
pub fn detect(
    config: &ReconConfig,
    invoice: &ExtractedInvoice,
    matching: &MatchingResult,
    ledger: &PoLedger,
) -> DiscrepancyReport {
    let mut discrepancies = Vec::new();
    let mut total_variance_amount = 0.0;
    let mut total_variance_percentage = 0.0;

    match matching.matched_po.as_deref().and_then(|n| ledger.get_by_number(n)) {
        None => {
            // High severity when the invoice itself carried no reference;
            // medium when a reference was present but unresolved.
            let severity = if invoice.po_reference.is_none() {
                Severity::High
            } else {
                Severity::Medium
            };
            discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::MissingPoReference,
                severity,
                field: "po_reference".into(),
                details: "Invoice does not match any PO in database.".into(),
                invoice_value: None,
                po_value: None,
                variance_percentage: None,
                confidence: 0.95,
            });
        }
        Some(po) => {
            check_line_items(config, invoice, po, &mut discrepancies);

            if let Some(d) = check_total_variance(config, invoice.total, po.total) {
                discrepancies.push(d);
            }

            total_variance_amount = (invoice.total - po.total).abs();
            if po.total > 0.0 {
                total_variance_percentage = total_variance_amount / po.total;
            }
        }
    }

    let reasoning = build_reasoning(&discrepancies);

    DiscrepancyReport {
        discrepancies,
        total_variance_amount,
        total_variance_percentage,
        reasoning,
    }
}

/// Per-line price and quantity checks. Invoice lines with no counterpart on
/// the PO are silently skipped — line coverage is the matching engine's
/// concern, not a discrepancy.
fn check_line_items(
    config: &ReconConfig,
    invoice: &ExtractedInvoice,
    po: &PurchaseOrder,
    out: &mut Vec<Discrepancy>,
) {
    let po_items: HashMap<&str, &PoLineItem> = po
        .line_items
        .iter()
        .map(|item| (item.item_id.as_str(), item))
        .collect();

    for (idx, inv_item) in invoice.line_items.iter().enumerate() {
        let Some(po_item) = po_items.get(inv_item.item_code.as_str()) else {
            continue;
        };

        if po_item.unit_price > 0.0 {
            let variance =
                (inv_item.unit_price - po_item.unit_price).abs() / po_item.unit_price;

            if variance > config.significant_price_variance {
                out.push(Discrepancy {
                    kind: DiscrepancyKind::PriceMismatch,
                    severity: Severity::High,
                    field: format!("line_items[{idx}].unit_price"),
                    details: format!(
                        "Line item '{}': Invoice price £{:.2} vs PO price £{:.2} ({:.1}% variance)",
                        inv_item.description,
                        inv_item.unit_price,
                        po_item.unit_price,
                        variance * 100.0
                    ),
                    invoice_value: Some(inv_item.unit_price),
                    po_value: Some(po_item.unit_price),
                    variance_percentage: Some(variance),
                    confidence: 0.99,
                });
            } else if variance > config.price_tolerance {
                out.push(Discrepancy {
                    kind: DiscrepancyKind::PriceVariance,
                    severity: Severity::Medium,
                    field: format!("line_items[{idx}].unit_price"),
                    details: format!(
                        "Line item '{}': Price variance of {:.1}% (within review threshold)",
                        inv_item.description,
                        variance * 100.0
                    ),
                    invoice_value: Some(inv_item.unit_price),
                    po_value: Some(po_item.unit_price),
                    variance_percentage: Some(variance),
                    confidence: 0.98,
                });
            }
        }

        // Exact numeric inequality, no tolerance band.
        if inv_item.quantity != po_item.quantity {
            out.push(Discrepancy {
                kind: DiscrepancyKind::QuantityMismatch,
                severity: Severity::Medium,
                field: format!("line_items[{idx}].quantity"),
                details: format!(
                    "Line item '{}': Invoice quantity {} vs PO quantity {}",
                    inv_item.description,
                    fmt_quantity(inv_item.quantity),
                    fmt_quantity(po_item.quantity)
                ),
                invoice_value: Some(inv_item.quantity),
                po_value: Some(po_item.quantity),
                variance_percentage: None,
                confidence: 0.99,
            });
        }
    }
}

/// Total variance is emitted only when BOTH the absolute and the relative
/// gates are exceeded. A £4 difference on a £1000 PO passes the percent gate
/// but fails the amount gate, so nothing is emitted.
fn check_total_variance(
    config: &ReconConfig,
    invoice_total: f64,
    po_total: f64,
) -> Option<Discrepancy> {
    let variance_amount = (invoice_total - po_total).abs();
    let variance_pct = if po_total > 0.0 {
        variance_amount / po_total
    } else {
        0.0
    };

    if variance_amount <= config.total_variance_amount {
        return None;
    }
    if variance_pct <= config.total_variance_percent {
        return None;
    }

    let severity = if variance_pct > HIGH_TOTAL_VARIANCE {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(Discrepancy {
        kind: DiscrepancyKind::TotalVariance,
        severity,
        field: "total".into(),
        details: format!(
            "Invoice total £{invoice_total:.2} vs PO total £{po_total:.2} \
             (£{variance_amount:.2} difference, {:.1}% variance)",
            variance_pct * 100.0
        ),
        invoice_value: Some(invoice_total),
        po_value: Some(po_total),
        variance_percentage: Some(variance_pct),
        confidence: 0.99,
    })
}

/// Quantities are decimal in the audit strings: integral values keep a
/// trailing `.0`.
fn fmt_quantity(q: f64) -> String {
    if q.fract() == 0.0 {
        format!("{q:.1}")
    } else {
        q.to_string()
    }
}

fn build_reasoning(discrepancies: &[Discrepancy]) -> String {
    if discrepancies.is_empty() {
        return "No discrepancies detected. All line items and totals match PO \
                within acceptable tolerance."
            .into();
    }

    let high = discrepancies
        .iter()
        .filter(|d| d.severity == Severity::High)
        .count();
    let medium = discrepancies
        .iter()
        .filter(|d| d.severity == Severity::Medium)
        .count();

    format!(
        "Found {} discrepancies: {high} high severity, {medium} medium severity. \
         Review required.",
        discrepancies.len()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
