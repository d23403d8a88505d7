//! Display state and its transitions.
//!
//! Every transition consumes the current state and returns the next one.
//! Entering the verify branch clears the analysis fields and vice versa.

use crate::types::VerifyOutcome;

/// Where the client is in its action cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Verifying,
    Verified,
    NotVerified,
    Analyzing,
    Analyzed,
}

/// Everything the UI renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplayState {
    pub phase: Phase,
    /// `None` = no verification to show.
    pub verified: Option<bool>,
    pub identity: Option<String>,
    /// Match confidence in [0, 100].
    pub confidence: Option<f64>,
    /// `Some(false)` while an analysis is in flight or after it failed.
    pub analyzed: Option<bool>,
    pub analysis: Vec<String>,
}

impl DisplayState {
    /// Reset verification fields ahead of a new capture.
    pub fn cleared_for_capture(self) -> Self {
        Self {
            verified: None,
            identity: None,
            confidence: None,
            ..self
        }
    }

    pub fn begin_verify(self) -> Self {
        Self {
            phase: Phase::Verifying,
            ..self
        }
    }

    /// Commit a completed registry pass.
    ///
    /// `confidence` is taken as-is: after a pass with no match it holds the
    /// last comparison's score rather than being reset.
    pub fn with_verification(self, outcome: VerifyOutcome) -> Self {
        Self {
            phase: if outcome.verified {
                Phase::Verified
            } else {
                Phase::NotVerified
            },
            verified: Some(outcome.verified),
            identity: outcome.identity,
            confidence: outcome.confidence,
            analyzed: None,
            analysis: Vec::new(),
        }
    }

    /// The registry pass could not complete.
    pub fn with_verification_failure(self) -> Self {
        Self {
            phase: Phase::NotVerified,
            verified: Some(false),
            identity: None,
            confidence: None,
            analyzed: None,
            analysis: Vec::new(),
        }
    }

    pub fn begin_analysis(self) -> Self {
        Self {
            phase: Phase::Analyzing,
            analyzed: Some(false),
            ..self
        }
    }

    /// Commit analysis summaries. An empty set leaves every field untouched.
    pub fn with_analysis(self, summaries: Vec<String>) -> Self {
        if summaries.is_empty() {
            return self.analysis_abandoned();
        }
        Self {
            phase: Phase::Analyzed,
            verified: None,
            identity: None,
            confidence: None,
            analyzed: Some(true),
            analysis: summaries,
        }
    }

    /// Analysis produced nothing; only the phase moves back to idle.
    pub fn analysis_abandoned(self) -> Self {
        Self {
            phase: Phase::Idle,
            ..self
        }
    }
}
