use std::path::PathBuf;

use apflow_recon::model::{DiscrepancyKind, MatchMethod, Severity};
use apflow_recon::{
    ExtractionInput, Pipeline, PoLedger, ReconConfig, ReconReport, RecommendedAction, RiskLevel,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_input(name: &str) -> ExtractionInput {
    let path = fixtures_dir().join(name);
    let data = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&data)
        .unwrap_or_else(|e| panic!("cannot parse {}: {e}", path.display()))
}

fn pipeline() -> Pipeline {
    pipeline_with(ReconConfig::default())
}

fn pipeline_with(config: ReconConfig) -> Pipeline {
    let ledger = PoLedger::load(&fixtures_dir().join("purchase_orders.json"));
    assert_eq!(ledger.len(), 3, "fixture ledger must load");
    Pipeline::new(config, ledger)
}

fn process(p: &Pipeline, fixture: &str) -> ReconReport {
    let input = load_input(fixture);
    p.process(fixture, &fixtures_dir().join(fixture).display().to_string(), input)
}

// -------------------------------------------------------------------------
// End-to-end verdicts
// -------------------------------------------------------------------------

#[test]
fn clean_invoice_auto_approves() {
    let report = process(&pipeline(), "invoice-clean.json");

    assert_eq!(report.invoice_id, "INV-2026-0442");
    assert!(report.errors.is_empty());

    let results = &report.processing_results;
    assert_eq!(results.recommended_action, Some(RecommendedAction::AutoApprove));
    assert_eq!(results.risk_level, Some(RiskLevel::None));
    assert!(results.discrepancies.is_empty());
    assert!(results.total_variance.within_tolerance);

    let matching = results.matching_results.as_ref().unwrap();
    assert_eq!(matching.match_method, MatchMethod::ExactPoReference);
    assert_eq!(matching.matched_po.as_deref(), Some("PO-2026-0117"));
    assert_eq!(matching.line_items_matched, 3);
    assert!(matching.supplier_match);
}

#[test]
fn overbilled_invoice_escalates() {
    let report = process(&pipeline(), "invoice-overbilled.json");
    let results = &report.processing_results;

    // STL-100 billed at 145 vs 120 (20.8%) plus an inflated total: two high
    // severity findings, so the pile-up rule fires before the price rule.
    assert_eq!(
        results.recommended_action,
        Some(RecommendedAction::EscalateToHuman)
    );
    assert_eq!(results.risk_level, Some(RiskLevel::High));

    let kinds: Vec<DiscrepancyKind> = results.discrepancies.iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DiscrepancyKind::PriceMismatch));
    assert!(kinds.contains(&DiscrepancyKind::TotalVariance));
    assert!(results
        .discrepancies
        .iter()
        .all(|d| d.severity == Severity::High));

    assert!(!results.total_variance.within_tolerance);
    assert!(results.reasoning.contains("Multiple high-severity"));
}

#[test]
fn unknown_supplier_escalates_with_missing_po_finding() {
    let report = process(&pipeline(), "invoice-unknown-supplier.json");
    let results = &report.processing_results;

    let matching = results.matching_results.as_ref().unwrap();
    assert_eq!(matching.match_method, MatchMethod::NoMatch);
    assert!(matching.matched_po.is_none());

    assert_eq!(results.discrepancies.len(), 1);
    let d = &results.discrepancies[0];
    assert_eq!(d.kind, DiscrepancyKind::MissingPoReference);
    assert_eq!(d.severity, Severity::High);
    assert_eq!(d.field, "po_reference");

    assert_eq!(
        results.recommended_action,
        Some(RecommendedAction::EscalateToHuman)
    );
    assert!(results.reasoning.contains("No matching PO found"));
}

#[test]
fn supplier_fallback_match_flags_for_review() {
    let mut input = load_input("invoice-clean.json");
    input.invoice.as_mut().unwrap().po_reference = None;

    let report = pipeline().process("invoice-clean.json", "mem", input);
    let results = &report.processing_results;

    let matching = results.matching_results.as_ref().unwrap();
    assert_eq!(matching.match_method, MatchMethod::SupplierMatch);
    assert_eq!(matching.po_match_confidence, 0.75);

    assert_eq!(
        results.recommended_action,
        Some(RecommendedAction::FlagForReview)
    );
    assert_eq!(results.risk_level, Some(RiskLevel::Medium));
    assert!(results.reasoning.contains("PO match confidence (75%)"));
}

#[test]
fn strict_config_blocks_auto_approval() {
    let toml = std::fs::read_to_string(fixtures_dir().join("strict.recon.toml")).unwrap();
    let config = ReconConfig::from_toml(&toml).unwrap();
    assert_eq!(config.high_confidence, 0.97);

    let report = process(&pipeline_with(config), "invoice-clean.json");
    let results = &report.processing_results;

    // Same clean invoice, but 0.96 extraction no longer clears the bar, so
    // the run lands on the general-caution fallthrough.
    assert_eq!(
        results.recommended_action,
        Some(RecommendedAction::FlagForReview)
    );
    assert_eq!(results.risk_level, Some(RiskLevel::Low));
    assert_eq!(results.confidence, 0.75);
    assert!(results.reasoning.contains("General caution"));
}

// -------------------------------------------------------------------------
// Report schema
// -------------------------------------------------------------------------

#[test]
fn report_json_has_expected_shape() {
    let report = process(&pipeline(), "invoice-clean.json");
    let json = serde_json::to_value(&report).unwrap();

    assert!(json["invoice_id"].is_string());
    assert!(json["processing_timestamp"].is_string());
    assert!(json["processing_duration_seconds"].is_number());
    assert!(json["errors"].as_array().unwrap().is_empty());

    let doc = &json["document_info"];
    assert_eq!(doc["filename"], "invoice-clean.json");
    assert_eq!(doc["document_quality"], "excellent");

    let results = &json["processing_results"];
    assert!(results["extraction_confidence"].is_number());
    assert!(results["extracted_data"]["line_items"].is_array());
    assert_eq!(results["matching_results"]["match_method"], "exact_po_reference");
    assert_eq!(results["recommended_action"], "auto_approve");
    assert_eq!(results["risk_level"], "none");
    assert!(results["total_variance"]["within_tolerance"].is_boolean());
    assert!(results["reasoning"].as_str().unwrap().contains(" | "));

    let trace = json["execution_trace"].as_object().unwrap();
    assert_eq!(trace.len(), 4);
    for stage in ["extraction", "matching", "discrepancy_detection", "resolution"] {
        let entry = &trace[stage];
        assert!(entry["duration_ms"].is_number());
        assert!(entry["confidence"].is_number());
        assert_eq!(entry["status"], "success");
    }
}

#[test]
fn discrepancy_json_uses_type_key() {
    let report = process(&pipeline(), "invoice-overbilled.json");
    let json = serde_json::to_value(&report).unwrap();

    let ds = json["processing_results"]["discrepancies"].as_array().unwrap();
    assert!(!ds.is_empty());
    for d in ds {
        assert!(d["type"].is_string());
        assert!(d["severity"].is_string());
        assert!(d["field"].is_string());
        assert!(d["details"].is_string());
        assert!(d["confidence"].is_number());
    }
}
