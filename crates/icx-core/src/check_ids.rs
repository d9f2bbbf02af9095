//! # Check Identifiers
//!
//! Stable identifiers recorded on every [`crate::ValidationResult`]. They
//! appear in `failed_checks` / `review_flags` on a resolution and in the
//! audit trail, so they are part of the external contract.

// -- Document authenticity ---------------------------------------------------

pub const DOCUMENT_REFERENCE_FORMAT: &str = "document.reference_format";
pub const DOCUMENT_DUPLICATE: &str = "document.duplicate";
pub const DOCUMENT_SEQUENCE: &str = "document.sequence";
pub const DOCUMENT_DATE_VS_METADATA: &str = "document.date_vs_metadata";

// -- Tax compliance ------------------------------------------------------------

/// Seller registration lookup against the tax authority.
pub const TAX_SELLER_REGISTRATION: &str = "tax.seller_registration";
/// Electronic reference (IRN) lookup against the tax authority.
pub const TAX_REFERENCE_REGISTRATION: &str = "tax.reference_registration";
/// Tariff-code rate cross-check, one result per examined line item.
pub const TAX_TARIFF_RATE: &str = "tax.tariff_rate";
/// E-invoice obligation lookup.
pub const TAX_E_INVOICE_REQUIRED: &str = "tax.e_invoice_required";
pub const TAX_ID_FORMAT: &str = "tax.id_format";
pub const TAX_STATE_CODE: &str = "tax.state_code";
pub const TAX_SUPPLY_TYPE: &str = "tax.supply_type";
pub const TAX_E_INVOICE_THRESHOLD: &str = "tax.e_invoice_threshold";

// -- Withholding tax ------------------------------------------------------------

/// Special (higher) withholding rate lookup. Advisory only.
pub const WITHHOLDING_SPECIAL_RATE: &str = "withholding.special_rate";
pub const WITHHOLDING_APPLICABILITY: &str = "withholding.applicability";
pub const WITHHOLDING_TAXPAYER_ID: &str = "withholding.taxpayer_id";
pub const WITHHOLDING_THRESHOLD: &str = "withholding.threshold";
pub const WITHHOLDING_TAX_COMPONENT: &str = "withholding.tax_component";
pub const WITHHOLDING_DEDUCTOR_ID: &str = "withholding.deductor_id";

// -- Arithmetic -------------------------------------------------------------------

pub const ARITHMETIC_LINE_ITEMS: &str = "arithmetic.line_items";
pub const ARITHMETIC_SUBTOTAL: &str = "arithmetic.subtotal";
pub const ARITHMETIC_TAX_AMOUNT: &str = "arithmetic.tax_amount";

// -- Policy -----------------------------------------------------------------------

pub const POLICY_PO_TOLERANCE: &str = "policy.po_tolerance";
pub const POLICY_CONTRACT_WINDOW: &str = "policy.contract_window";
pub const POLICY_APPROVED_VENDOR: &str = "policy.approved_vendor";
pub const POLICY_APPROVAL_LIMIT: &str = "policy.approval_limit";

// -- Synthetic ----------------------------------------------------------------------

/// Marker placed in `failed_checks` when evaluation of an invoice failed
/// at the worker boundary.
pub const SYSTEM_ERROR: &str = "SYSTEM_ERROR";
