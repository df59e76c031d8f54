//! In-memory PO ledger — loaded once at startup, read-only thereafter.
//!
//! Absence or parse failure of the backing store yields an *empty* ledger,
//! never an error: downstream stages treat an empty ledger as "no match
//! possible", which feeds the resolution tree as a first-class outcome.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoLineItem {
    pub item_id: String,
    pub unit_price: f64,
    pub quantity: f64,
}

impl Default for PoLineItem {
    fn default() -> Self {
        Self {
            item_id: String::new(),
            unit_price: 0.0,
            quantity: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PurchaseOrder {
    /// Unique key; compared case-insensitively.
    pub po_number: String,
    pub supplier: String,
    pub line_items: Vec<PoLineItem>,
    pub total: f64,
}

#[derive(Debug, Default, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    purchase_orders: Vec<PurchaseOrder>,
}

/// A PO annotated with its product-code overlap against a query.
#[derive(Debug, Clone)]
pub struct ProductMatch<'a> {
    pub po: &'a PurchaseOrder,
    pub match_count: usize,
    /// |intersection| / max(|query codes|, |PO codes|). The max denominator
    /// penalizes POs carrying many extra lines; kept deliberately.
    pub match_rate: f64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PoLedger {
    pos: Vec<PurchaseOrder>,
}

impl PoLedger {
    pub fn new(pos: Vec<PurchaseOrder>) -> Self {
        Self { pos }
    }

    /// Parse a JSON ledger store. Malformed input yields an empty ledger.
    pub fn from_json(input: &str) -> Self {
        match serde_json::from_str::<LedgerFile>(input) {
            Ok(file) => Self::new(file.purchase_orders),
            Err(e) => {
                warn!("failed to parse PO ledger, continuing with empty ledger: {e}");
                Self::default()
            }
        }
    }

    /// Read the ledger store from disk. A missing or unreadable file yields
    /// an empty ledger.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => Self::from_json(&data),
            Err(e) => {
                warn!(
                    "failed to read PO ledger at {}, continuing with empty ledger: {e}",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    pub fn all(&self) -> &[PurchaseOrder] {
        &self.pos
    }

    /// Case-insensitive exact match on PO number.
    pub fn get_by_number(&self, po_number: &str) -> Option<&PurchaseOrder> {
        self.pos
            .iter()
            .find(|po| po.po_number.eq_ignore_ascii_case(po_number))
    }

    /// Case-insensitive bidirectional substring containment on supplier name.
    /// Returns matches in ledger order; callers take the first.
    pub fn search_by_supplier(&self, supplier_name: &str) -> Vec<&PurchaseOrder> {
        let query = supplier_name.to_lowercase();
        self.pos
            .iter()
            .filter(|po| {
                let candidate = po.supplier.to_lowercase();
                candidate.contains(&query) || query.contains(&candidate)
            })
            .collect()
    }

    /// POs with a non-empty (uppercased) item-code set intersection against
    /// `product_codes`, sorted descending by match rate. Duplicate codes
    /// count once in the intersection, but the rate denominator keeps the
    /// raw list lengths. Ties keep ledger order (stable sort).
    pub fn search_by_products(&self, product_codes: &[String]) -> Vec<ProductMatch<'_>> {
        let query: Vec<String> = product_codes.iter().map(|c| c.to_uppercase()).collect();
        let query_set: HashSet<&str> = query.iter().map(String::as_str).collect();

        let mut results: Vec<ProductMatch<'_>> = self
            .pos
            .iter()
            .filter_map(|po| {
                let po_codes: Vec<String> = po
                    .line_items
                    .iter()
                    .map(|item| item.item_id.to_uppercase())
                    .collect();
                let po_set: HashSet<&str> = po_codes.iter().map(String::as_str).collect();
                let match_count = query_set.intersection(&po_set).count();
                if match_count == 0 {
                    return None;
                }
                let denominator = query.len().max(po_codes.len());
                Some(ProductMatch {
                    po,
                    match_count,
                    match_rate: match_count as f64 / denominator as f64,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.match_rate
                .partial_cmp(&a.match_rate)
                .unwrap_or(Ordering::Equal)
        });
        results
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
