//! Resolution rule tree — decides auto-approve, flag, or escalate from the
//! upstream stage outputs. Rules are evaluated in order; the first to apply
//! wins, so escalation conditions always shadow approval conditions.

use crate::config::ReconConfig;
use crate::model::{
    Discrepancy, DiscrepancyKind, MatchingResult, RecommendedAction, Resolution, RiskLevel,
    Severity,
};

/// Minimum PO-match confidence for auto-approval. Sits below the exact-match
/// confidence (0.99) and above the supplier tier (0.75), so only exact
/// reference hits can auto-approve.
const AUTO_APPROVE_MATCH_CONFIDENCE: f64 = 0.85;

/// Walk the rule tree and produce a verdict.
///
/// `matching` is `None` when the matching stage never ran (upstream failure);
/// that is treated the same as a no-match outcome.
pub fn resolve(
    config: &ReconConfig,
    extraction_confidence: f64,
    matching: Option<&MatchingResult>,
    discrepancies: &[Discrepancy],
) -> Resolution {
    let high = discrepancies
        .iter()
        .filter(|d| d.severity == Severity::High)
        .count();
    let medium = discrepancies
        .iter()
        .filter(|d| d.severity == Severity::Medium)
        .count();

    let has_po_match = matching.map_or(false, |m| m.matched_po.is_some());
    let po_confidence = matching.map_or(0.0, |m| m.po_match_confidence);

    // Rule 1: extraction too poor to trust anything downstream.
    if extraction_confidence < config.low_confidence {
        return Resolution {
            action: RecommendedAction::EscalateToHuman,
            risk: RiskLevel::High,
            confidence: 0.95,
            reasoning: "Very low extraction confidence (<50%). Document quality too poor \
                        for automated processing. Human review required."
                .into(),
        };
    }

    // Rule 2: nothing to validate against.
    if !has_po_match {
        return Resolution {
            action: RecommendedAction::EscalateToHuman,
            risk: RiskLevel::High,
            confidence: 0.90,
            reasoning: "No matching PO found in database. Cannot validate invoice without \
                        PO reference. Human review required."
                .into(),
        };
    }

    // Rule 3: pile-up of serious findings.
    if high >= 2 {
        return Resolution {
            action: RecommendedAction::EscalateToHuman,
            risk: RiskLevel::High,
            confidence: 0.95,
            reasoning: format!(
                "Multiple high-severity discrepancies detected ({high}). Requires \
                 immediate human review."
            ),
        };
    }

    // Rule 4: a single severe price mismatch is enough to escalate.
    if let Some(d) = discrepancies
        .iter()
        .find(|d| d.kind == DiscrepancyKind::PriceMismatch && d.severity == Severity::High)
    {
        let variance_pct = d.variance_percentage.unwrap_or(0.0) * 100.0;
        return Resolution {
            action: RecommendedAction::EscalateToHuman,
            risk: RiskLevel::High,
            confidence: 0.98,
            reasoning: format!(
                "Significant price variance detected ({variance_pct:.1}%). Exceeds \
                 auto-approval threshold. Human review required."
            ),
        };
    }

    // Rule 5: any remaining finding at all.
    if high == 1 || medium > 0 {
        return Resolution {
            action: RecommendedAction::FlagForReview,
            risk: RiskLevel::Medium,
            confidence: 0.85,
            reasoning: format!(
                "Found {high} high and {medium} medium severity discrepancies. Recommend \
                 human review before approval."
            ),
        };
    }

    // Rule 6: extraction in the review band.
    if extraction_confidence < config.medium_confidence {
        return Resolution {
            action: RecommendedAction::FlagForReview,
            risk: RiskLevel::Medium,
            confidence: 0.80,
            reasoning: format!(
                "Extraction confidence ({:.0}%) below auto-approve threshold. Recommend \
                 review.",
                extraction_confidence * 100.0
            ),
        };
    }

    // Rule 7: match quality below the auto-approve bar.
    if po_confidence < AUTO_APPROVE_MATCH_CONFIDENCE {
        return Resolution {
            action: RecommendedAction::FlagForReview,
            risk: RiskLevel::Medium,
            confidence: 0.80,
            reasoning: format!(
                "PO match confidence ({:.0}%) below auto-approve threshold. Recommend \
                 review.",
                po_confidence * 100.0
            ),
        };
    }

    // Rule 8: everything lines up.
    if discrepancies.is_empty() && extraction_confidence >= config.high_confidence {
        return Resolution {
            action: RecommendedAction::AutoApprove,
            risk: RiskLevel::None,
            confidence: 0.98,
            reasoning: format!(
                "All criteria met for auto-approval. High extraction confidence ({:.0}%), \
                 exact PO match, zero discrepancies detected. Safe to approve.",
                extraction_confidence * 100.0
            ),
        };
    }

    // Rule 9: fallthrough.
    Resolution {
        action: RecommendedAction::FlagForReview,
        risk: RiskLevel::Low,
        confidence: 0.75,
        reasoning: "General caution: recommend human review to verify all details.".into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
