use serde::Deserialize;

use crate::error::ReconError;

/// Tolerance bands and confidence thresholds for the reconciliation engine.
///
/// Every field is externally overridable through TOML; defaults reproduce the
/// production decision boundaries and must not drift, since downstream audit
/// comparisons depend on them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Extraction confidence at or above which auto-approval is allowed.
    pub high_confidence: f64,
    /// Extraction confidence below which an invoice is flagged for review.
    pub medium_confidence: f64,
    /// Extraction confidence below which an invoice escalates to a human.
    pub low_confidence: f64,
    /// Unit-price variance tolerated without any discrepancy (fraction).
    pub price_tolerance: f64,
    /// Unit-price variance above which a high-severity mismatch is raised.
    pub significant_price_variance: f64,
    /// Absolute invoice-total variance gate, in ledger currency units.
    pub total_variance_amount: f64,
    /// Relative invoice-total variance gate (fraction of the PO total).
    pub total_variance_percent: f64,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            high_confidence: 0.90,
            medium_confidence: 0.70,
            low_confidence: 0.50,
            price_tolerance: 0.02,
            significant_price_variance: 0.15,
            total_variance_amount: 5.0,
            total_variance_percent: 0.01,
        }
    }
}

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        for (name, value) in [
            ("high_confidence", self.high_confidence),
            ("medium_confidence", self.medium_confidence),
            ("low_confidence", self.low_confidence),
            ("price_tolerance", self.price_tolerance),
            ("significant_price_variance", self.significant_price_variance),
            ("total_variance_percent", self.total_variance_percent),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReconError::ConfigValidation(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }

        if self.low_confidence > self.medium_confidence
            || self.medium_confidence > self.high_confidence
        {
            return Err(ReconError::ConfigValidation(format!(
                "confidence thresholds must be ordered low <= medium <= high, got {} / {} / {}",
                self.low_confidence, self.medium_confidence, self.high_confidence
            )));
        }

        if self.price_tolerance > self.significant_price_variance {
            return Err(ReconError::ConfigValidation(format!(
                "price_tolerance ({}) exceeds significant_price_variance ({})",
                self.price_tolerance, self.significant_price_variance
            )));
        }

        if self.total_variance_amount < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "total_variance_amount must be >= 0, got {}",
                self.total_variance_amount
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_thresholds() {
        let config = ReconConfig::default();
        assert_eq!(config.high_confidence, 0.90);
        assert_eq!(config.medium_confidence, 0.70);
        assert_eq!(config.low_confidence, 0.50);
        assert_eq!(config.price_tolerance, 0.02);
        assert_eq!(config.significant_price_variance, 0.15);
        assert_eq!(config.total_variance_amount, 5.0);
        assert_eq!(config.total_variance_percent, 0.01);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config.price_tolerance, 0.02);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = ReconConfig::from_toml(
            r#"
price_tolerance = 0.05
total_variance_amount = 10.0
"#,
        )
        .unwrap();
        assert_eq!(config.price_tolerance, 0.05);
        assert_eq!(config.total_variance_amount, 10.0);
        assert_eq!(config.significant_price_variance, 0.15);
        assert_eq!(config.high_confidence, 0.90);
    }

    #[test]
    fn reject_out_of_range_confidence() {
        let err = ReconConfig::from_toml("high_confidence = 1.5").unwrap_err();
        assert!(err.to_string().contains("high_confidence"));
    }

    #[test]
    fn reject_unordered_confidence_thresholds() {
        let err = ReconConfig::from_toml(
            r#"
low_confidence = 0.8
medium_confidence = 0.6
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ordered"));
    }

    #[test]
    fn reject_inverted_price_bands() {
        let err = ReconConfig::from_toml(
            r#"
price_tolerance = 0.20
significant_price_variance = 0.15
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("price_tolerance"));
    }

    #[test]
    fn reject_malformed_toml() {
        let err = ReconConfig::from_toml("price_tolerance = ").unwrap_err();
        assert!(err.to_string().contains("config parse error"));
    }
}
