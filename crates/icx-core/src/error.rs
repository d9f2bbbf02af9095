//! # Error Types
//!
//! Errors raised while constructing core values. Rule evaluation itself
//! never surfaces these to callers: a malformed field becomes a REVIEW
//! result at the check boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to interpret a monetary or quantity value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// The input is not a decimal number.
    #[error("invalid amount {input:?}: {reason}")]
    Invalid {
        /// The rejected input, verbatim.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Non-finite floats (NaN, infinities) cannot represent money.
    #[error("non-finite amount is not permitted: {0}")]
    NonFinite(String),
}

/// Failure to load or validate engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`crate::EngineConfig`].
    #[error("failed to parse config {path}: {source}")]
    Yaml {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// A value is outside its permitted range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted field path, e.g. `tax_rules.statutory_rate`.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A decision string that is not one of the three known decisions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown decision {0:?} (expected APPROVE, APPROVE_WITH_REVIEW or ESCALATE)")]
pub struct UnknownDecision(pub String);
