//! Pipeline orchestration — runs the four stages in order and assembles the
//! final report.
//!
//! Stage failures are absorbed: a failed stage records an error string and
//! the run continues, so a report is always produced. Only successful stages
//! get an execution-trace entry.

use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ReconConfig;
use crate::discrepancy;
use crate::error::ReconError;
use crate::ledger::PoLedger;
use crate::matcher;
use crate::model::{
    DocumentInfo, ExtractedInvoice, ProcessingContext, ProcessingResults, ReconReport,
    StageStatus, StageTrace, VarianceSummary,
};
use crate::resolution;

/// Extraction confidence is capped below certainty; the scoring heuristic can
/// never claim a perfect read.
const MAX_SCORED_CONFIDENCE: f64 = 0.99;

/// Per-invoice input handed over by the extraction collaborator.
///
/// `extraction_confidence` is optional: when the collaborator does not supply
/// one, the pipeline scores the extracted fields itself.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractionInput {
    pub invoice: Option<ExtractedInvoice>,
    pub extraction_confidence: Option<f64>,
    pub document_quality: String,
}

/// The reconciliation pipeline. Construct once, run per invoice.
pub struct Pipeline {
    config: ReconConfig,
    ledger: PoLedger,
}

impl Pipeline {
    pub fn new(config: ReconConfig, ledger: PoLedger) -> Self {
        Self { config, ledger }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PoLedger {
        &self.ledger
    }

    /// Process one invoice end to end and return the report.
    pub fn process(&self, filename: &str, path: &str, input: ExtractionInput) -> ReconReport {
        let started = Instant::now();
        let mut ctx = ProcessingContext::new(path, filename);

        info!(filename, "processing invoice");

        self.run_stage(&mut ctx, "extraction", |p, ctx| {
            p.stage_extraction(ctx, &input)
        });
        self.run_stage(&mut ctx, "matching", Self::stage_matching);
        self.run_stage(&mut ctx, "discrepancy_detection", Self::stage_discrepancy);
        self.run_stage(&mut ctx, "resolution", Self::stage_resolution);

        self.build_report(ctx, started)
    }

    /// Time one stage and record its outcome. Failures land in `ctx.errors`
    /// and leave no trace entry.
    fn run_stage<F>(&self, ctx: &mut ProcessingContext, name: &str, stage: F)
    where
        F: FnOnce(&Self, &mut ProcessingContext) -> Result<f64, ReconError>,
    {
        let started = Instant::now();
        match stage(self, ctx) {
            Ok(confidence) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                debug!(stage = name, confidence, duration_ms, "stage complete");
                ctx.trace.insert(
                    name.to_string(),
                    StageTrace {
                        duration_ms,
                        confidence,
                        status: StageStatus::Success,
                    },
                );
            }
            Err(e) => {
                debug!(stage = name, error = %e, "stage failed");
                ctx.errors.push(format!("{name}: {e}"));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    fn stage_extraction(
        &self,
        ctx: &mut ProcessingContext,
        input: &ExtractionInput,
    ) -> Result<f64, ReconError> {
        let Some(invoice) = input.invoice.clone() else {
            ctx.document_quality = "poor".into();
            return Err(ReconError::MissingInput("no extracted invoice supplied".into()));
        };

        ctx.document_quality = input.document_quality.clone();
        ctx.extraction_confidence = match input.extraction_confidence {
            Some(confidence) => confidence,
            None => score_extraction(&invoice, &input.document_quality),
        };
        ctx.extraction_reasoning = format!(
            "Extracted invoice {} with {} quality. Found {} line items. \
             Extraction confidence: {:.2}%.",
            invoice.invoice_number,
            ctx.document_quality,
            invoice.line_items.len(),
            ctx.extraction_confidence * 100.0
        );
        ctx.extracted = Some(invoice);

        Ok(ctx.extraction_confidence)
    }

    fn stage_matching(&self, ctx: &mut ProcessingContext) -> Result<f64, ReconError> {
        let invoice = ctx
            .extracted
            .as_ref()
            .ok_or_else(|| ReconError::MissingInput("no extracted invoice to match".into()))?;

        let outcome = matcher::match_invoice(&self.ledger, invoice);
        let confidence = outcome.result.po_match_confidence;
        ctx.matching_reasoning = outcome.reasoning;
        ctx.matching = Some(outcome.result);

        Ok(confidence)
    }

    fn stage_discrepancy(&self, ctx: &mut ProcessingContext) -> Result<f64, ReconError> {
        let invoice = ctx
            .extracted
            .as_ref()
            .ok_or_else(|| ReconError::MissingInput("no extracted invoice to compare".into()))?;
        let matching = ctx
            .matching
            .as_ref()
            .ok_or_else(|| ReconError::MissingInput("no matching result available".into()))?;

        let report = discrepancy::detect(&self.config, invoice, matching, &self.ledger);
        ctx.discrepancies = report.discrepancies;
        ctx.total_variance_amount = report.total_variance_amount;
        ctx.total_variance_percentage = report.total_variance_percentage;
        ctx.discrepancy_reasoning = report.reasoning;

        Ok(0.95)
    }

    fn stage_resolution(&self, ctx: &mut ProcessingContext) -> Result<f64, ReconError> {
        let resolution = resolution::resolve(
            &self.config,
            ctx.extraction_confidence,
            ctx.matching.as_ref(),
            &ctx.discrepancies,
        );

        ctx.recommended_action = Some(resolution.action);
        ctx.risk_level = Some(resolution.risk);
        ctx.recommendation_confidence = resolution.confidence;
        ctx.resolution_reasoning = resolution.reasoning;

        Ok(ctx.recommendation_confidence)
    }

    // -----------------------------------------------------------------------
    // Report assembly
    // -----------------------------------------------------------------------

    fn build_report(&self, ctx: ProcessingContext, started: Instant) -> ReconReport {
        let invoice_id = ctx
            .extracted
            .as_ref()
            .map(|inv| inv.invoice_number.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(&ctx.invoice_filename)
            .to_string();

        let within_tolerance = ctx.total_variance_amount <= self.config.total_variance_amount
            && ctx.total_variance_percentage <= self.config.total_variance_percent;

        let reasoning = join_reasoning(&[
            ("EXTRACTION", &ctx.extraction_reasoning),
            ("MATCHING", &ctx.matching_reasoning),
            ("DISCREPANCIES", &ctx.discrepancy_reasoning),
            ("RESOLUTION", &ctx.resolution_reasoning),
        ]);

        info!(
            invoice_id = %invoice_id,
            action = %ctx
                .recommended_action
                .map(|a| a.to_string())
                .unwrap_or_default(),
            errors = ctx.errors.len(),
            "processing complete"
        );

        ReconReport {
            invoice_id,
            processing_timestamp: chrono::Utc::now().to_rfc3339(),
            processing_duration_seconds: started.elapsed().as_secs_f64(),
            document_info: DocumentInfo {
                filename: ctx.invoice_filename,
                document_quality: ctx.document_quality.clone(),
            },
            processing_results: ProcessingResults {
                extraction_confidence: ctx.extraction_confidence,
                document_quality: ctx.document_quality,
                extracted_data: ctx.extracted,
                matching_results: ctx.matching,
                discrepancies: ctx.discrepancies,
                total_variance: VarianceSummary {
                    amount: ctx.total_variance_amount,
                    percentage: ctx.total_variance_percentage,
                    within_tolerance,
                },
                recommended_action: ctx.recommended_action,
                risk_level: ctx.risk_level,
                confidence: ctx.recommendation_confidence,
                reasoning,
            },
            execution_trace: ctx.trace,
            errors: ctx.errors,
        }
    }
}

/// Score extraction quality from the extracted fields themselves, used when
/// the collaborator supplies no confidence of its own.
fn score_extraction(invoice: &ExtractedInvoice, document_quality: &str) -> f64 {
    let mut score: f64 = 0.5;

    match document_quality {
        "excellent" => score += 0.3,
        "acceptable" => score += 0.2,
        _ => {}
    }

    if !invoice.invoice_number.is_empty() {
        score += 0.05;
    }
    if !invoice.invoice_date.is_empty() {
        score += 0.05;
    }
    if !invoice.supplier_name.is_empty() {
        score += 0.05;
    }
    if invoice.total > 0.0 {
        score += 0.05;
    }
    if !invoice.line_items.is_empty() {
        score += 0.1;
    }

    score.min(MAX_SCORED_CONFIDENCE)
}

fn join_reasoning(parts: &[(&str, &str)]) -> String {
    parts
        .iter()
        .filter(|(_, text)| !text.is_empty())
        .map(|(prefix, text)| format!("{prefix}: {text}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
