//! Purchasing-policy rules.

use icx_core::check_ids;
use icx_core::{Amount, CheckCategory, InvoiceContext, PolicyConfig, TaxRules, ValidationResult};
use serde_json::json;

use crate::{missing_data, CheckError, RuleCheck};

const CATEGORY: CheckCategory = CheckCategory::Policy;

/// Invoice value within a relative band of the purchase order.
#[derive(Debug)]
pub struct PoTolerance {
    tolerance: Amount,
    missing_impact: f64,
}

impl PoTolerance {
    pub fn new(rules: &TaxRules, policy: &PolicyConfig) -> Self {
        Self {
            tolerance: policy.po_tolerance.clone(),
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for PoTolerance {
    fn id(&self) -> &'static str {
        check_ids::POLICY_PO_TOLERANCE
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Invoice within purchase-order tolerance"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let Some(po) = &invoice.purchase_order_amount else {
            return Ok(ValidationResult::skip(self.id(), CATEGORY, "No PO linked"));
        };
        if !po.is_positive() {
            return Err(CheckError::InvalidValue {
                field: "purchase_order_amount",
                reason: format!("must be positive, got {po}"),
            });
        }
        let Some(value) = &invoice.invoice_value else {
            return Ok(missing_data(self, self.missing_impact, "invoice value"));
        };

        let deviation = (value.as_decimal() - po.as_decimal()).abs() / po.as_decimal();
        if &deviation <= self.tolerance.as_decimal() {
            return Ok(ValidationResult::pass(self.id(), CATEGORY));
        }
        Ok(ValidationResult::fail(self.id(), CATEGORY, "PO tolerance exceeded", 0.20)
            .with_metadata("purchase_order_amount", json!(po))
            .with_metadata("invoice_value", json!(value)))
    }
}

/// Invoice dated within the contract's validity window (inclusive).
#[derive(Debug)]
pub struct ContractWindow {
    missing_impact: f64,
}

impl ContractWindow {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for ContractWindow {
    fn id(&self) -> &'static str {
        check_ids::POLICY_CONTRACT_WINDOW
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Invoice date within contract period"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let (Some(start), Some(end)) = (invoice.contract_start, invoice.contract_end) else {
            return Ok(ValidationResult::skip(self.id(), CATEGORY, "No contract window"));
        };
        if start > end {
            return Err(CheckError::InvalidValue {
                field: "contract_end",
                reason: format!("contract ends ({end}) before it starts ({start})"),
            });
        }
        let Some(date) = invoice.invoice_date else {
            return Ok(missing_data(self, self.missing_impact, "invoice date"));
        };
        if (start..=end).contains(&date) {
            return Ok(ValidationResult::pass(self.id(), CATEGORY));
        }
        Ok(ValidationResult::fail(self.id(), CATEGORY, "Outside contract period", 0.10))
    }
}

/// Counterparty is on the approved list.
#[derive(Debug)]
pub struct ApprovedVendor {
    missing_impact: f64,
}

impl ApprovedVendor {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for ApprovedVendor {
    fn id(&self) -> &'static str {
        check_ids::POLICY_APPROVED_VENDOR
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Vendor is approved"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        match invoice.vendor_approved {
            Some(true) => Ok(ValidationResult::pass(self.id(), CATEGORY)),
            Some(false) => Ok(ValidationResult::fail(self.id(), CATEGORY, "Vendor not approved", 0.30)),
            None => Ok(missing_data(self, self.missing_impact, "vendor approval status")),
        }
    }
}

/// Invoice value within the approver's limit.
#[derive(Debug)]
pub struct ApprovalLimit {
    default_limit: Option<Amount>,
    missing_impact: f64,
}

impl ApprovalLimit {
    pub fn new(rules: &TaxRules, policy: &PolicyConfig) -> Self {
        Self {
            default_limit: policy.default_approver_limit.clone(),
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for ApprovalLimit {
    fn id(&self) -> &'static str {
        check_ids::POLICY_APPROVAL_LIMIT
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Invoice value within approval limit"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let limit = invoice.approver_limit.as_ref().or(self.default_limit.as_ref());
        let (Some(limit), Some(value)) = (limit, &invoice.invoice_value) else {
            return Ok(missing_data(self, self.missing_impact, "approval limit or invoice value"));
        };
        if value <= limit {
            return Ok(ValidationResult::pass(self.id(), CATEGORY));
        }
        Ok(ValidationResult::fail(self.id(), CATEGORY, "Approval escalation required", 0.20)
            .with_metadata("approver_limit", json!(limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use icx_core::CheckStatus;

    fn amt(s: &str) -> Option<Amount> {
        Some(Amount::parse(s).unwrap())
    }

    #[test]
    fn po_tolerance_band() {
        let check = PoTolerance::new(&TaxRules::default(), &PolicyConfig::default());
        let mut inv = InvoiceContext::new("INV-1");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Skip);

        inv.purchase_order_amount = amt("100000");
        inv.invoice_value = amt("105000");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Pass);

        inv.invoice_value = amt("105000.01");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Fail);

        inv.invoice_value = amt("95000");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn zero_po_is_an_error() {
        let check = PoTolerance::new(&TaxRules::default(), &PolicyConfig::default());
        let mut inv = InvoiceContext::new("INV-1");
        inv.purchase_order_amount = amt("0");
        inv.invoice_value = amt("10");
        assert!(matches!(
            check.evaluate(&inv),
            Err(CheckError::InvalidValue { field: "purchase_order_amount", .. })
        ));
    }

    #[test]
    fn contract_window_inclusive() {
        let check = ContractWindow::new(&TaxRules::default());
        let mut inv = InvoiceContext::new("INV-1");
        inv.contract_start = NaiveDate::from_ymd_opt(2024, 1, 1);
        inv.contract_end = NaiveDate::from_ymd_opt(2024, 12, 31);
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Review);

        inv.invoice_date = NaiveDate::from_ymd_opt(2024, 12, 31);
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Pass);

        inv.invoice_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Fail);

        inv.contract_end = NaiveDate::from_ymd_opt(2023, 1, 1);
        assert!(check.evaluate(&inv).is_err());
    }

    #[test]
    fn approved_vendor_tristate() {
        let check = ApprovedVendor::new(&TaxRules::default());
        let mut inv = InvoiceContext::new("INV-1");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Review);
        inv.vendor_approved = Some(false);
        let r = check.evaluate(&inv).unwrap();
        assert_eq!(r.status, CheckStatus::Fail);
        assert_eq!(r.confidence_impact, 0.30);
        inv.vendor_approved = Some(true);
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn approval_limit_falls_back_to_configured_default() {
        let policy = PolicyConfig {
            default_approver_limit: amt("200000"),
            ..PolicyConfig::default()
        };
        let check = ApprovalLimit::new(&TaxRules::default(), &policy);
        let mut inv = InvoiceContext::new("INV-1");
        inv.invoice_value = amt("150000");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Pass);

        inv.approver_limit = amt("100000");
        assert_eq!(check.evaluate(&inv).unwrap().status, CheckStatus::Fail);

        let no_default = ApprovalLimit::new(&TaxRules::default(), &PolicyConfig::default());
        inv.approver_limit = None;
        assert_eq!(no_default.evaluate(&inv).unwrap().status, CheckStatus::Review);
    }
}
