//! Arithmetic checks. Every comparison is on exact decimals.

use bigdecimal::BigDecimal;
use icx_core::check_ids;
use icx_core::{Amount, CheckCategory, InvoiceContext, TaxRules, ValidationResult};
use serde_json::json;

use crate::{missing_data, CheckError, RuleCheck};

const CATEGORY: CheckCategory = CheckCategory::Arithmetic;

/// `quantity × unit_rate == amount` on every line.
#[derive(Debug)]
pub struct LineItemMath {
    missing_impact: f64,
}

impl LineItemMath {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for LineItemMath {
    fn id(&self) -> &'static str {
        check_ids::ARITHMETIC_LINE_ITEMS
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Line item quantity × rate equals amount"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        if invoice.line_items.is_empty() {
            return Ok(ValidationResult::skip(self.id(), CATEGORY, "No line items"));
        }

        let mut incomplete = Vec::new();
        for (index, item) in invoice.line_items.iter().enumerate() {
            let (Some(qty), Some(rate), Some(amount)) = (&item.quantity, &item.unit_rate, &item.amount)
            else {
                incomplete.push(index);
                continue;
            };
            let computed = qty.as_decimal() * rate.as_decimal();
            if &computed != amount.as_decimal() {
                return Ok(ValidationResult::fail(self.id(), CATEGORY, "Line item math mismatch", 0.10)
                    .with_metadata("line", json!(index))
                    .with_metadata("computed", json!(Amount::from(computed)))
                    .with_metadata("declared", json!(amount)));
            }
        }

        if !incomplete.is_empty() {
            return Ok(missing_data(self, self.missing_impact, "quantity, rate or amount on a line item")
                .with_metadata("lines", json!(incomplete)));
        }
        Ok(ValidationResult::pass(self.id(), CATEGORY))
    }
}

/// Declared subtotal equals the sum of line amounts. An undeclared subtotal
/// is taken to be the computed sum.
#[derive(Debug)]
pub struct Subtotal {
    missing_impact: f64,
}

impl Subtotal {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for Subtotal {
    fn id(&self) -> &'static str {
        check_ids::ARITHMETIC_SUBTOTAL
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Subtotal equals sum of line amounts"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        if invoice.line_items.is_empty() {
            return Ok(ValidationResult::skip(self.id(), CATEGORY, "No line items"));
        }
        let mut sum = BigDecimal::from(0);
        for item in &invoice.line_items {
            let Some(amount) = &item.amount else {
                return Ok(missing_data(self, self.missing_impact, "line item amount"));
            };
            sum += amount.as_decimal();
        }

        match &invoice.subtotal {
            Some(declared) if declared.as_decimal() != &sum => Ok(ValidationResult::fail(
                self.id(),
                CATEGORY,
                "Subtotal mismatch",
                0.10,
            )
            .with_metadata("computed", json!(Amount::from(sum)))
            .with_metadata("declared", json!(declared))),
            _ => Ok(ValidationResult::pass(self.id(), CATEGORY)),
        }
    }
}

/// `|taxable × statutory_rate − tax| ≤ tolerance`.
#[derive(Debug)]
pub struct TaxAmount {
    rate: Amount,
    tolerance: Amount,
    missing_impact: f64,
}

impl TaxAmount {
    pub fn new(rules: &TaxRules) -> Self {
        Self {
            rate: rules.statutory_rate.clone(),
            tolerance: rules.tax_tolerance.clone(),
            missing_impact: rules.missing_data_impact,
        }
    }
}

impl RuleCheck for TaxAmount {
    fn id(&self) -> &'static str {
        check_ids::ARITHMETIC_TAX_AMOUNT
    }

    fn category(&self) -> CheckCategory {
        CATEGORY
    }

    fn description(&self) -> &'static str {
        "Tax amount matches taxable amount × statutory rate"
    }

    fn evaluate(&self, invoice: &InvoiceContext) -> Result<ValidationResult, CheckError> {
        let (Some(taxable), Some(tax)) = (&invoice.taxable_amount, &invoice.tax_amount) else {
            return Ok(missing_data(self, self.missing_impact, "taxable amount or tax amount"));
        };
        let expected = taxable.as_decimal() * self.rate.as_decimal();
        let deviation = (&expected - tax.as_decimal()).abs();
        if &deviation > self.tolerance.as_decimal() {
            return Ok(ValidationResult::fail(self.id(), CATEGORY, "Tax calculation error", 0.15)
                .with_metadata("expected", json!(Amount::from(expected)))
                .with_metadata("declared", json!(tax)));
        }
        Ok(ValidationResult::pass(self.id(), CATEGORY))
    }
}
