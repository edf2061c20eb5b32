use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one pipeline stage.
///
/// `Skipped` means the stage had nothing to work with (e.g. no rows to
/// forecast); `Failed` means it tried and could not finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded { detail: String },
    Skipped { reason: String },
    Failed { reason: String },
}

impl StepOutcome {
    pub fn succeeded(detail: impl Into<String>) -> Self {
        StepOutcome::Succeeded { detail: detail.into() }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped { reason: reason.into() }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StepOutcome::Failed { reason: reason.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Succeeded { .. } => "succeeded",
            StepOutcome::Skipped { .. } => "skipped",
            StepOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Succeeded { detail } => write!(f, "succeeded ({})", detail),
            StepOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            StepOutcome::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}
