//! Error type for rule checks.
//!
//! A check returns `Err` only when its inputs are present but unusable
//! (a zero purchase order, an inverted contract window). The Validator maps
//! every `Err` to a REVIEW result tagged with the check id; no error ever
//! escapes past it.

/// Failure of a single rule check.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckError {
    /// A field is present but its value makes the rule undefined.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}
