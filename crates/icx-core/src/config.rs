//! # Engine Configuration
//!
//! Policy knobs for rule evaluation and batch execution, loaded from YAML.
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.
//!
//! ```yaml
//! confidence_threshold: 0.7
//! max_workers: 8
//! tax_rules:
//!   statutory_rate: 0.18
//!   tax_tolerance: 1
//! policy:
//!   po_tolerance: 0.05
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::ConfigError;

/// Default approval bar for aggregated confidence.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Default upper bound on concurrent invoice evaluations.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Impact applied when a check cannot run for lack of data.
pub const MISSING_DATA_IMPACT: f64 = 0.05;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Confidence below this yields APPROVE_WITH_REVIEW. In `[0, 1]`.
    pub confidence_threshold: f64,
    pub max_workers: usize,
    /// Optional per-invoice wall-clock bound. `None` disables it.
    pub invoice_timeout_secs: Option<u64>,
    pub tax_rules: TaxRules,
    pub policy: PolicyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_workers: DEFAULT_MAX_WORKERS,
            invoice_timeout_secs: None,
            tax_rules: TaxRules::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// Statutory parameters for tax and withholding checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxRules {
    /// Rate applied to the taxable amount, e.g. `0.18`.
    pub statutory_rate: Amount,
    /// Absolute tolerance on the computed tax amount.
    pub tax_tolerance: Amount,
    /// Invoice value at or above which an electronic reference is expected.
    pub e_invoice_threshold: Amount,
    /// Invoice value above which withholding applies.
    pub withholding_threshold: Amount,
    pub missing_data_impact: f64,
}

impl Default for TaxRules {
    fn default() -> Self {
        Self {
            statutory_rate: Amount::parse("0.18").unwrap_or_else(|_| Amount::zero()),
            tax_tolerance: Amount::from_int(1),
            e_invoice_threshold: Amount::from_int(500_000),
            withholding_threshold: Amount::from_int(30_000),
            missing_data_impact: MISSING_DATA_IMPACT,
        }
    }
}

/// Organisational purchasing policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Relative tolerance between invoice value and purchase order.
    pub po_tolerance: Amount,
    /// Approval limit used when the invoice carries none.
    pub default_approver_limit: Option<Amount>,
    /// Deductor id used when the invoice carries none.
    pub deductor_id: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            po_tolerance: Amount::parse("0.05").unwrap_or_else(|_| Amount::zero()),
            default_approver_limit: None,
            deductor_id: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()
    }

    /// Parse and validate YAML text. An empty document yields defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: "<inline>".into(),
            source,
        })?;
        config.validate()
    }

    /// Reject impossible values and clamp out-of-range thresholds.
    ///
    /// The confidence threshold is clamped into `[0, 1]` (NaN becomes the
    /// default) with a warning; a zero worker count and negative statutory
    /// parameters are errors.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.confidence_threshold = clamp_threshold(self.confidence_threshold);

        if self.max_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "max_workers",
                reason: "must be at least 1".into(),
            });
        }
        if self.invoice_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "invoice_timeout_secs",
                reason: "must be positive when set".into(),
            });
        }

        let zero = Amount::zero();
        let non_negative = [
            ("tax_rules.statutory_rate", &self.tax_rules.statutory_rate),
            ("tax_rules.tax_tolerance", &self.tax_rules.tax_tolerance),
            ("tax_rules.e_invoice_threshold", &self.tax_rules.e_invoice_threshold),
            ("tax_rules.withholding_threshold", &self.tax_rules.withholding_threshold),
            ("policy.po_tolerance", &self.policy.po_tolerance),
        ];
        for (field, value) in non_negative {
            if *value < zero {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must not be negative, got {value}"),
                });
            }
        }

        let impact = self.tax_rules.missing_data_impact;
        if !impact.is_finite() || impact < 0.0 {
            tracing::warn!(impact, "missing_data_impact invalid, using default {MISSING_DATA_IMPACT}");
            self.tax_rules.missing_data_impact = MISSING_DATA_IMPACT;
        }

        Ok(self)
    }
}

fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        tracing::warn!("confidence_threshold is NaN, using default {DEFAULT_CONFIDENCE_THRESHOLD}");
        DEFAULT_CONFIDENCE_THRESHOLD
    } else if threshold < 0.0 {
        tracing::warn!(threshold, "confidence_threshold < 0.0, clamping to 0.0");
        0.0
    } else if threshold > 1.0 {
        tracing::warn!(threshold, "confidence_threshold > 1.0, clamping to 1.0");
        1.0
    } else {
        threshold
    }
}
