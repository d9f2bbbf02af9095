//! Withholding-tax rules. Advisory in nature: they inform deduction
//! mechanics rather than the legality of the supply.

use icx_core::check_ids;
use icx_core::{Amount, CheckCategory, InvoiceContext, PolicyConfig, TaxRules, ValidationResult};

use crate::{missing_data, CheckError, RuleCheck};

const CATEGORY: CheckCategory = CheckCategory::WithholdingTax;

/// Individuals and proprietors get the simplified treatment; anyone else
/// needs confirmation.
#[derive(Debug)]
pub struct Applicability {
    missing_impact: f64,
}

impl Applicability {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for Applicability {
    fn id(&self) -> &'static str {
        check_ids::WITHHOLDING_APPLICABILITY
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Withholding applicability by counterparty type"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        match invoice.vendor_type {
            Some(t) if t.is_individual_or_proprietor() => Ok(ValidationResult::pass(self.id(), CATEGORY)),
            Some(_) => Ok(ValidationResult::review(
                self.id(),
                CATEGORY,
                "TDS applicability needs confirmation",
                self.missing_impact,
            )),
            None => Ok(missing_data(self, self.missing_impact, "vendor type")),
        }
    }
}

/// Without a taxpayer id the higher withholding rate applies.
#[derive(Debug, Default)]
pub struct TaxpayerIdPresent;

impl RuleCheck for TaxpayerIdPresent {
    fn id(&self) -> &'static str {
        check_ids::WITHHOLDING_TAXPAYER_ID
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Higher withholding if taxpayer id not available"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        if invoice.vendor_taxpayer_id().is_some() {
            return Ok(ValidationResult::pass(self.id(), CATEGORY));
        }
        Ok(ValidationResult::fail(
            self.id(),
            CATEGORY,
            "PAN not available, higher TDS applicable",
            0.15,
        ))
    }
}

/// Withholding applies only above the threshold; below it the rule is
/// skipped.
#[derive(Debug)]
pub struct Threshold {
    threshold: Amount,
    missing_impact: f64,
}

impl Threshold {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            threshold: rules.withholding_threshold.clone(),
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for Threshold {
    fn id(&self) -> &'static str {
        check_ids::WITHHOLDING_THRESHOLD
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Withholding threshold applicability"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let Some(value) = &invoice.invoice_value else {
            return Ok(missing_data(self, self.missing_impact, "invoice value"));
        };
        if *value > self.threshold {
            Ok(ValidationResult::pass(self.id(), CATEGORY))
        } else {
            Ok(ValidationResult::skip(self.id(), CATEGORY, "Below withholding threshold"))
        }
    }
}

/// Withholding must be computed on the value excluding the tax component.
#[derive(Debug, Default)]
pub struct TaxComponentExclusion;

impl RuleCheck for TaxComponentExclusion {
    fn id(&self) -> &'static str {
        check_ids::WITHHOLDING_TAX_COMPONENT
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Withholding excludes the tax component"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        if invoice.withholding_on_tax_component {
            return Ok(ValidationResult::fail(
                self.id(),
                CATEGORY,
                "TDS deducted on GST component",
                0.10,
            ));
        }
        Ok(ValidationResult::pass(self.id(), CATEGORY))
    }
}

/// The deducting party's id is known, from the invoice or configuration.
#[derive(Debug)]
pub struct DeductorIdPresent {
    configured: Option<String>,
    missing_impact: f64,
}

impl DeductorIdPresent {
    pub fn new(rules: &TaxRules, policy: &PolicyConfig) -> Self {
        Self {
            configured: policy.deductor_id.clone().filter(|s| !s.trim().is_empty()),
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for DeductorIdPresent {
    fn id(&self) -> &'static str {
        check_ids::WITHHOLDING_DEDUCTOR_ID
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Deductor id availability"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let on_invoice = invoice.deductor_id.as_deref().is_some_and(|s| !s.trim().is_empty());
        if on_invoice || self.configured.is_some() {
            return Ok(ValidationResult::pass(self.id(), CATEGORY));
        }
        Ok(ValidationResult::review(self.id(), CATEGORY, "TAN not configured", self.missing_impact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icx_core::{CheckStatus, CounterpartyType};

    #[test]
    fn applicability_by_counterparty() {
        let check = Applicability::new(&TaxRules::default());
        let mut inv = InvoiceContext::new("INV-1");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Review);
        inv.vendor_type = Some(CounterpartyType::Company);
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Review);
        inv.vendor_type = Some(CounterpartyType::Individual);
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn missing_taxpayer_id_fails() {
        let mut inv = InvoiceContext::new("INV-1");
        let r = TaxpayerIdPresent.evaluate(&inv).unwrap();
        assert_eq!(r.status, CheckStatus::Fail);
        assert_eq!(r.confidence_impact, 0.15);
        inv.vendor_taxpayer_id = Some("AAAPL1234C".into());
        assert_eq!(TaxpayerIdPresent.evaluate(&inv).unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn threshold_skips_at_or_below() {
        let check = Threshold::new(&TaxRules::default());
        let mut inv = InvoiceContext::new("INV-1");
        inv.invoice_value = Some(Amount::from_int(30_000));
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Skip);
        inv.invoice_value = Some(Amount::from_int(30_001));
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn deductor_from_config_counts() {
        let inv = InvoiceContext::new("INV-1");
        let bare = DeductorIdPresent::new(&TaxRules::default(), &PolicyConfig::default());
        assert_eq!(bare.evaluate(&inv).unwrap().status, CheckStatus::Review);

        let policy = PolicyConfig {
            deductor_id: Some("MUMA12345B".into()),
            ..PolicyConfig::default()
        };
        let configured = DeductorIdPresent::new(&TaxRules::default(), &policy);
        assert_eq!(configured.evaluate(&inv).unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn tax_component_flag() {
        let mut inv = InvoiceContext::new("INV-1");
        assert_eq!(TaxComponentExclusion.evaluate(&inv).unwrap().status, CheckStatus::Pass);
        inv.withholding_on_tax_component = true;
        assert_eq!(TaxComponentExclusion.evaluate(&inv).unwrap().status, CheckStatus::Fail);
    }
}
