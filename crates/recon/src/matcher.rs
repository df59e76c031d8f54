//! Tiered PO matching — exact reference, then supplier, then product
//! overlap. First tier to succeed wins; the order is load-bearing.

use crate::ledger::{PoLedger, PurchaseOrder};
use crate::model::{ExtractedInvoice, MatchMethod, MatchingResult};

/// Confidence assigned to an exact PO-reference hit.
const EXACT_CONFIDENCE: f64 = 0.99;
/// Confidence assigned to a supplier-name hit.
const SUPPLIER_CONFIDENCE: f64 = 0.75;
/// Product-overlap confidence is the overlap rate scaled by this factor.
const PRODUCT_CONFIDENCE_SCALE: f64 = 0.8;

/// A resolved match plus its audit narrative.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub result: MatchingResult,
    pub reasoning: String,
}

/// Resolve the best PO for an invoice.
///
/// Tier order:
/// 1. exact PO reference (case-insensitive) — confidence 0.99
/// 2. supplier name containment, first hit in ledger order — confidence 0.75
/// 3. product-code overlap, top-ranked — confidence `match_rate * 0.8`
/// 4. no match — confidence 0.0
pub fn match_invoice(ledger: &PoLedger, invoice: &ExtractedInvoice) -> MatchOutcome {
    let mut matched: Option<(&PurchaseOrder, MatchMethod, f64)> = None;

    if let Some(po_ref) = invoice.po_reference.as_deref() {
        if let Some(po) = ledger.get_by_number(po_ref) {
            matched = Some((po, MatchMethod::ExactPoReference, EXACT_CONFIDENCE));
        }
    }

    if matched.is_none() {
        // Supplier ordering among multiple candidates is not disambiguated
        // further; the first ledger hit wins.
        if let Some(&po) = ledger.search_by_supplier(&invoice.supplier_name).first() {
            matched = Some((po, MatchMethod::SupplierMatch, SUPPLIER_CONFIDENCE));
        }
    }

    if matched.is_none() && !invoice.line_items.is_empty() {
        let codes: Vec<String> = invoice
            .line_items
            .iter()
            .filter(|item| !item.item_code.is_empty())
            .map(|item| item.item_code.clone())
            .collect();
        if let Some(best) = ledger.search_by_products(&codes).first() {
            matched = Some((
                best.po,
                MatchMethod::ProductFuzzyMatch,
                best.match_rate * PRODUCT_CONFIDENCE_SCALE,
            ));
        }
    }

    let result = match matched {
        Some((po, method, confidence)) => build_result(invoice, po, method, confidence),
        None => MatchingResult::no_match(),
    };
    let reasoning = build_reasoning(&result, invoice);

    MatchOutcome { result, reasoning }
}

/// Assemble the result for a resolved PO. Line-item counts are recomputed
/// here against the selected PO, independently of whatever overlap the
/// product search measured against intermediate candidates.
fn build_result(
    invoice: &ExtractedInvoice,
    po: &PurchaseOrder,
    method: MatchMethod,
    confidence: f64,
) -> MatchingResult {
    let total_items = invoice.line_items.len();
    let po_codes: Vec<&str> = po.line_items.iter().map(|i| i.item_id.as_str()).collect();
    let matched_items = invoice
        .line_items
        .iter()
        .filter(|item| po_codes.contains(&item.item_code.as_str()))
        .count();

    let match_rate = if total_items > 0 {
        matched_items as f64 / total_items as f64
    } else {
        0.0
    };

    let inv_supplier = normalize_supplier(&invoice.supplier_name);
    let po_supplier = normalize_supplier(&po.supplier);
    let supplier_match =
        inv_supplier.contains(&po_supplier) || po_supplier.contains(&inv_supplier);

    MatchingResult {
        po_match_confidence: confidence,
        matched_po: Some(po.po_number.clone()),
        match_method: method,
        supplier_match,
        line_items_matched: matched_items,
        line_items_total: total_items,
        match_rate,
        alternative_matches: Vec::new(),
    }
}

fn normalize_supplier(name: &str) -> String {
    name.to_lowercase()
        .replace("ltd", "")
        .replace("limited", "")
        .trim()
        .to_string()
}

fn build_reasoning(result: &MatchingResult, invoice: &ExtractedInvoice) -> String {
    match &result.matched_po {
        Some(po_number) => format!(
            "Matched to PO {po_number} using {} with {:.0}% confidence. {}/{} line items matched.",
            result.match_method,
            result.po_match_confidence * 100.0,
            result.line_items_matched,
            result.line_items_total
        ),
        None => {
            let invoice_number = if invoice.invoice_number.is_empty() {
                "UNKNOWN"
            } else {
                &invoice.invoice_number
            };
            format!(
                "No PO match found for invoice {invoice_number}. \
                 No matching supplier or products in database."
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
