//! # Decisions
//!
//! The three terminal decisions, the Resolver's output ([`Resolution`]) and
//! the persisted audit row ([`DecisionRecord`]).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UnknownDecision;

/// Terminal decision for one invoice in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    ApproveWithReview,
    Escalate,
}

impl Decision {
    /// Wire and storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::ApproveWithReview => "APPROVE_WITH_REVIEW",
            Self::Escalate => "ESCALATE",
        }
    }

    /// Display label for reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Approve => "Approved",
            Self::ApproveWithReview => "Approved with Review",
            Self::Escalate => "Escalated",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = UnknownDecision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(Self::Approve),
            "APPROVE_WITH_REVIEW" => Ok(Self::ApproveWithReview),
            "ESCALATE" => Ok(Self::Escalate),
            _ => Err(UnknownDecision(s.to_string())),
        }
    }
}

/// Output of the Resolver for one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub invoice_id: String,
    pub decision: Decision,
    pub final_confidence: f64,
    pub failed_checks: Vec<String>,
    pub review_flags: Vec<String>,
    pub conflicts: Vec<String>,
    /// A prior APPROVE exists for this invoice and this run found a FAIL.
    pub deviated_from_history: bool,
    pub primary_reason: String,
    /// Mirrors `decision == ESCALATE`. Kept as a field so serialised
    /// resolutions carry it; always set through [`Resolution::new`].
    pub escalation_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Resolution {
    pub fn new(
        invoice_id: impl Into<String>,
        decision: Decision,
        final_confidence: f64,
        primary_reason: impl Into<String>,
    ) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            decision,
            final_confidence,
            failed_checks: Vec::new(),
            review_flags: Vec::new(),
            conflicts: Vec::new(),
            deviated_from_history: false,
            primary_reason: primary_reason.into(),
            escalation_required: decision == Decision::Escalate,
            explanation: None,
        }
    }

    pub fn escalation_required(&self) -> bool {
        self.decision == Decision::Escalate
    }
}

/// Persisted audit row. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Insertion order, assigned by the store.
    pub seq: i64,
    pub invoice_id: String,
    pub decision: Decision,
    pub confidence: f64,
    /// Run that produced the row; absent for imported history.
    pub run_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
