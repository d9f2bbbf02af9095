//! # icx-client — Tax Authority and Explainer Clients
//!
//! Outbound integrations of the compliance engine:
//!
//! - [`TaxApiClient`]: the tax-validation API (registration, reference,
//!   tariff rate, e-invoice obligation, special withholding). Honours 429
//!   wait hints with a bounded retry budget, applies a per-attempt timeout
//!   and owns a TTL response cache.
//! - [`HttpExplainer`]: advisory natural-language explanations.
//!
//! Both sit behind traits ([`TaxAuthority`], [`Explainer`]) so the engine
//! can run against the network, the deterministic [`StaticTaxAuthority`],
//! or a test double.
//!
//! ## Crate Policy
//!
//! - Depends on `icx-core` for value types only. No rule semantics here.
//! - Ordinary non-2xx answers are data, not errors.

pub mod authority;
pub mod cache;
pub mod config;
pub mod error;
pub mod explainer;
pub mod retry;
pub mod tax;
pub mod types;

pub use authority::{StaticTaxAuthority, TaxAuthority, VendorRecord, VendorRegistry};
pub use cache::TtlCache;
pub use config::{ConfigError, ExplainerConfig, TaxApiConfig};
pub use error::{ExplainError, RegistryError, TaxApiError};
pub use explainer::{normalize_explanation, ExplainContext, Explainer, HttpExplainer};
pub use tax::TaxApiClient;
pub use types::ApiResponse;
