//! `apflow-recon` — Invoice-to-PO reconciliation engine.
//!
//! Consumes pre-extracted invoice data, matches it against a purchase-order
//! ledger, detects discrepancies, and recommends an action. Pure engine
//! crate: no CLI, no document parsing.

pub mod config;
pub mod discrepancy;
pub mod error;
pub mod fuzzy;
pub mod ledger;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod resolution;

pub use config::ReconConfig;
pub use error::ReconError;
pub use ledger::{PoLedger, PurchaseOrder};
pub use model::{
    Discrepancy, ExtractedInvoice, MatchingResult, ReconReport, RecommendedAction, RiskLevel,
};
pub use pipeline::{ExtractionInput, Pipeline};
