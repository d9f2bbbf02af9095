//! # Check Registry
//!
//! Groups rule checks by category. Built once per batch run from an
//! [`EngineConfig`] and prepared with that run's [`BatchView`], so nothing
//! one run learns leaks into the next.

use std::collections::BTreeMap;
use std::sync::Arc;

use icx_core::{CheckCategory, EngineConfig};

use crate::{arithmetic, document, policy, tax, withholding, BatchView, RuleCheck};

/// Rule checks grouped by category, in registration order.
#[derive(Default, Clone)]
pub struct CheckRegistry {
    checks: BTreeMap<CheckCategory, Vec<Arc<dyn RuleCheck>>>,
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.checks.iter().map(|(c, v)| (c, v.iter().map(|r| r.id()).collect::<Vec<_>>())))
            .finish()
    }
}

impl CheckRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard rule set, parameterised by `config`.
    pub fn standard(config: &EngineConfig) -> Self {
        let rules = &config.tax_rules;
        let policy_cfg = &config.policy;
        let mut registry = Self::new();

        registry.register(document::InvoiceNumberFormat);
        registry.register(document::DuplicateInvoice::new(rules));
        registry.register(document::InvoiceSequence::new());
        registry.register(document::DateVsMetadata);

        registry.register(tax::TaxIdFormat);
        registry.register(tax::StateCodeMatch::new(rules));
        registry.register(tax::SupplyType::new(rules));
        registry.register(tax::EInvoiceThreshold::new(rules));

        registry.register(withholding::Applicability::new(rules));
        registry.register(withholding::TaxpayerIdPresent);
        registry.register(withholding::Threshold::new(rules));
        registry.register(withholding::TaxComponentExclusion);
        registry.register(withholding::DeductorIdPresent::new(rules, policy_cfg));

        registry.register(arithmetic::LineItemMath::new(rules));
        registry.register(arithmetic::Subtotal::new(rules));
        registry.register(arithmetic::TaxAmount::new(rules));

        registry.register(policy::PoTolerance::new(rules, policy_cfg));
        registry.register(policy::ContractWindow::new(rules));
        registry.register(policy::ApprovedVendor::new(rules));
        registry.register(policy::ApprovalLimit::new(rules, policy_cfg));

        registry
    }

    /// Append a check to its category.
    pub fn register(&mut self, check: impl RuleCheck + 'static) {
        let check: Arc<dyn RuleCheck> = Arc::new(check);
        self.checks.entry(check.category()).or_default().push(check);
    }

    /// Hand the batch to every check. Call before evaluating any invoice.
    pub fn prepare(&self, batch: &BatchView<'_>) {
        for check in self.checks.values().flatten() {
            check.prepare(batch);
        }
    }

    /// Checks of one category, in registration order.
    pub fn category(&self, category: CheckCategory) -> &[Arc<dyn RuleCheck>] {
        self.checks.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

}
