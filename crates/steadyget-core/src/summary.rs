//! Run summary

use serde::Serialize;
use std::fmt;
use steadyget_types::DownloadOutcome;

/// Overall judgement of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// There was nothing to do
    Nothing,
    AllDone,
    /// Some tasks failed, most likely resource-specific
    SomeFailed,
    /// Every task failed, most likely systemic (network down, bad proxy)
    AllFailed,
    /// The run was stopped before every task started
    Cancelled,
}

/// Counts over a result vector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[DownloadOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            if outcome.success {
                summary.succeeded += 1;
            } else if outcome.was_attempted() {
                summary.failed += 1;
            } else {
                summary.not_attempted += 1;
            }
        }

        summary
    }

    pub fn verdict(&self) -> Verdict {
        if self.total == 0 {
            Verdict::Nothing
        } else if self.succeeded == self.total {
            Verdict::AllDone
        } else if self.not_attempted > 0 {
            Verdict::Cancelled
        } else if self.succeeded == 0 {
            Verdict::AllFailed
        } else {
            Verdict::SomeFailed
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.verdict(), Verdict::AllDone | Verdict::Nothing)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} done, {} failed, {} not attempted ({} total)",
            self.succeeded, self.failed, self.not_attempted, self.total
        )
    }
}
