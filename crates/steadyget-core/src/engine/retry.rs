//! Retry bookkeeping for one transfer
//!
//! The counters live in a plain value so every transition can be
//! exercised without a server.

use steadyget_types::ErrorClass;

/// What the engine does after an attempt or a validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Body fully received; continue with validation
    Complete,
    /// Reconnect immediately, no budget spent
    RetryNow,
    /// Sleep for the retry delay, then reconnect
    RetryAfterDelay,
    /// Connect budget exhausted
    GiveUp(ErrorClass),
}

/// Counters threaded through the attempt loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub connect_retries: u32,
    pub validate_retries: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the result of one attempt.
    ///
    /// `class` is ignored when `complete` is set.
    pub fn after_attempt(
        &mut self,
        complete: bool,
        class: ErrorClass,
        max_connect_retries: u32,
    ) -> Transition {
        if complete {
            self.connect_retries = 0;
            return Transition::Complete;
        }

        if !class.counts_against_budget() {
            self.connect_retries = 0;
            return Transition::RetryNow;
        }

        self.connect_retries += 1;
        if self.connect_retries > max_connect_retries {
            Transition::GiveUp(class)
        } else {
            Transition::RetryAfterDelay
        }
    }

    /// Record a rejected body. Returns false once the budget is spent.
    pub fn after_validation_failure(&mut self, max_validate_retries: u32) -> bool {
        self.validate_retries += 1;
        self.validate_retries <= max_validate_retries
    }

    /// Human-readable status for the current attempt
    pub fn status_text(&self) -> String {
        let mut text = String::from("Downloading");
        if self.connect_retries > 0 {
            text.push_str(&format!(" (retry #{})", self.connect_retries));
        }
        if self.validate_retries > 0 {
            text.push_str(&format!(" (validation failure #{})", self.validate_retries));
        }
        text
    }
}
