use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single invoice line as delivered by the extraction collaborator.
///
/// Missing fields default to empty/zero — the engine trusts but validates
/// minimally. Immutable once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub item_code: String,
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub line_total: f64,
    pub extraction_confidence: f64,
}

/// The structured invoice record produced by the (external) extraction step.
///
/// `total` should approximate `subtotal + vat_amount`, but the engine never
/// enforces or corrects that — it is passed through as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedInvoice {
    pub invoice_number: String,
    pub invoice_date: String,
    pub supplier_name: String,
    pub supplier_address: Option<String>,
    pub supplier_vat: Option<String>,
    pub po_reference: Option<String>,
    pub payment_terms: Option<String>,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub subtotal: f64,
    pub vat_amount: f64,
    pub vat_rate: f64,
    pub total: f64,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// The tier of the matching strategy that resolved a PO for an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExactPoReference,
    SupplierMatch,
    ProductFuzzyMatch,
    NoMatch,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactPoReference => write!(f, "exact_po_reference"),
            Self::SupplierMatch => write!(f, "supplier_match"),
            Self::ProductFuzzyMatch => write!(f, "product_fuzzy_match"),
            Self::NoMatch => write!(f, "no_match"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchingResult {
    pub po_match_confidence: f64,
    pub matched_po: Option<String>,
    pub match_method: MatchMethod,
    pub supplier_match: bool,
    pub line_items_matched: usize,
    pub line_items_total: usize,
    /// matched/total; 0 when the invoice has no line items.
    pub match_rate: f64,
    /// Reserved for ranked runner-up candidates; always empty today.
    pub alternative_matches: Vec<serde_json::Value>,
}

impl MatchingResult {
    /// Result for an invoice no tier could resolve.
    pub fn no_match() -> Self {
        Self {
            po_match_confidence: 0.0,
            matched_po: None,
            match_method: MatchMethod::NoMatch,
            supplier_match: false,
            line_items_matched: 0,
            line_items_total: 0,
            match_rate: 0.0,
            alternative_matches: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Discrepancies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    MissingPoReference,
    PriceMismatch,
    PriceVariance,
    QuantityMismatch,
    TotalVariance,
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPoReference => write!(f, "missing_po_reference"),
            Self::PriceMismatch => write!(f, "price_mismatch"),
            Self::PriceVariance => write!(f, "price_variance"),
            Self::QuantityMismatch => write!(f, "quantity_mismatch"),
            Self::TotalVariance => write!(f, "total_variance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
}

/// A detected mismatch between invoice and PO data.
#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    #[serde(rename = "type")]
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    /// Path of the offending field, e.g. `line_items[2].unit_price`.
    pub field: String,
    pub details: String,
    pub invoice_value: Option<f64>,
    pub po_value: Option<f64>,
    pub variance_percentage: Option<f64>,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    AutoApprove,
    FlagForReview,
    EscalateToHuman,
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoApprove => write!(f, "auto_approve"),
            Self::FlagForReview => write!(f, "flag_for_review"),
            Self::EscalateToHuman => write!(f, "escalate_to_human"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

/// Final verdict of the resolution rule tree.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub action: RecommendedAction,
    pub risk: RiskLevel,
    pub confidence: f64,
    pub reasoning: String,
}

// ---------------------------------------------------------------------------
// Processing context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
}

/// Per-stage timing/confidence record kept for audit.
#[derive(Debug, Clone, Serialize)]
pub struct StageTrace {
    pub duration_ms: u64,
    pub confidence: f64,
    pub status: StageStatus,
}

/// Accumulated state for one invoice run.
///
/// Created fresh per invoice and owned by the pipeline for the duration of
/// the run; each stage takes it and hands it back updated. Never shared
/// across concurrent runs.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub invoice_path: String,
    pub invoice_filename: String,

    // Extraction-consumption stage
    pub extraction_confidence: f64,
    pub document_quality: String,
    pub extracted: Option<ExtractedInvoice>,
    pub extraction_reasoning: String,

    // Matching stage
    pub matching: Option<MatchingResult>,
    pub matching_reasoning: String,

    // Discrepancy stage
    pub discrepancies: Vec<Discrepancy>,
    pub total_variance_amount: f64,
    pub total_variance_percentage: f64,
    pub discrepancy_reasoning: String,

    // Resolution stage
    pub recommended_action: Option<RecommendedAction>,
    pub risk_level: Option<RiskLevel>,
    pub recommendation_confidence: f64,
    pub resolution_reasoning: String,

    // Audit
    pub trace: BTreeMap<String, StageTrace>,
    pub errors: Vec<String>,
}

impl ProcessingContext {
    pub fn new(invoice_path: &str, invoice_filename: &str) -> Self {
        Self {
            invoice_path: invoice_path.to_string(),
            invoice_filename: invoice_filename.to_string(),
            extraction_confidence: 0.0,
            document_quality: String::new(),
            extracted: None,
            extraction_reasoning: String::new(),
            matching: None,
            matching_reasoning: String::new(),
            discrepancies: Vec::new(),
            total_variance_amount: 0.0,
            total_variance_percentage: 0.0,
            discrepancy_reasoning: String::new(),
            recommended_action: None,
            risk_level: None,
            recommendation_confidence: 0.0,
            resolution_reasoning: String::new(),
            trace: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub document_quality: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VarianceSummary {
    pub amount: f64,
    pub percentage: f64,
    pub within_tolerance: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResults {
    pub extraction_confidence: f64,
    pub document_quality: String,
    pub extracted_data: Option<ExtractedInvoice>,
    pub matching_results: Option<MatchingResult>,
    pub discrepancies: Vec<Discrepancy>,
    pub total_variance: VarianceSummary,
    pub recommended_action: Option<RecommendedAction>,
    pub risk_level: Option<RiskLevel>,
    pub confidence: f64,
    /// Concatenated per-stage reasoning, `" | "`-separated.
    pub reasoning: String,
}

/// The final report consumed by front-ends. Always produced, even for
/// degraded runs — a non-empty `errors` list signals reduced confidence.
#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub invoice_id: String,
    pub processing_timestamp: String,
    pub processing_duration_seconds: f64,
    pub document_info: DocumentInfo,
    pub processing_results: ProcessingResults,
    pub execution_trace: BTreeMap<String, StageTrace>,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_method_serializes_snake_case() {
        let json = serde_json::to_string(&MatchMethod::ExactPoReference).unwrap();
        assert_eq!(json, "\"exact_po_reference\"");
        assert_eq!(MatchMethod::NoMatch.to_string(), "no_match");
    }

    #[test]
    fn discrepancy_kind_field_is_named_type() {
        let d = Discrepancy {
            kind: DiscrepancyKind::PriceMismatch,
            severity: Severity::High,
            field: "line_items[0].unit_price".into(),
            details: "x".into(),
            invoice_value: Some(118.0),
            po_value: Some(100.0),
            variance_percentage: Some(0.18),
            confidence: 0.99,
        };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["type"], "price_mismatch");
        assert_eq!(v["severity"], "high");
    }

    #[test]
    fn invoice_deserializes_with_missing_fields() {
        let inv: ExtractedInvoice =
            serde_json::from_str(r#"{"invoice_number": "INV-1"}"#).unwrap();
        assert_eq!(inv.invoice_number, "INV-1");
        assert_eq!(inv.total, 0.0);
        assert!(inv.po_reference.is_none());
        assert!(inv.line_items.is_empty());
    }

    #[test]
    fn no_match_result_is_empty() {
        let r = MatchingResult::no_match();
        assert_eq!(r.match_method, MatchMethod::NoMatch);
        assert_eq!(r.po_match_confidence, 0.0);
        assert!(r.matched_po.is_none());
        assert_eq!(r.match_rate, 0.0);
    }

    #[test]
    fn risk_level_none_serializes() {
        assert_eq!(serde_json::to_string(&RiskLevel::None).unwrap(), "\"none\"");
    }
}
