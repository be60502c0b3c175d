//! Single-flight analysis coordinator
//!
//! The coordinator owns the one `AnalysisState` of the pipeline. Every
//! transition out of `Idle` happens in `begin`, and the only suspension point
//! is `AnalysisRequest::execute`, which runs outside the coordinator and hands
//! its result back through `complete`.

use crate::ai::backends::AnalyzerBackend;
use crate::ai::AnalysisOutcome;
use crate::error::AnalysisError;
use crate::events::{EventId, LogEvent};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Lifecycle of the active fault candidate
///
/// Exactly one value at any time. A candidate is present in every state
/// except `Idle`, so there can never be two active candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AnalysisState {
    /// No fault is active
    #[default]
    Idle,
    /// Analyzer call in flight for the candidate
    Pending { candidate: LogEvent },
    /// Analyzer answered
    Ready {
        candidate: LogEvent,
        outcome: AnalysisOutcome,
    },
    /// Analyzer failed; `outcome` is the fallback
    Failed {
        candidate: LogEvent,
        outcome: AnalysisOutcome,
    },
}

impl AnalysisState {
    pub fn is_idle(&self) -> bool {
        matches!(self, AnalysisState::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AnalysisState::Pending { .. })
    }

    /// Whether an outcome is waiting for `apply_fix` or `dismiss`
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            AnalysisState::Ready { .. } | AnalysisState::Failed { .. }
        )
    }

    /// The active candidate, if any
    pub fn candidate(&self) -> Option<&LogEvent> {
        match self {
            AnalysisState::Idle => None,
            AnalysisState::Pending { candidate }
            | AnalysisState::Ready { candidate, .. }
            | AnalysisState::Failed { candidate, .. } => Some(candidate),
        }
    }

    /// The stored outcome, real or fallback
    pub fn outcome(&self) -> Option<&AnalysisOutcome> {
        match self {
            AnalysisState::Ready { outcome, .. } | AnalysisState::Failed { outcome, .. } => {
                Some(outcome)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisState::Idle => "idle",
            AnalysisState::Pending { .. } => "pending",
            AnalysisState::Ready { .. } => "ready",
            AnalysisState::Failed { .. } => "failed",
        }
    }
}

/// One analyzer call issued for a candidate
///
/// Produced only by `AnalysisCoordinator::begin`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    candidate_id: EventId,
    message: String,
}

impl AnalysisRequest {
    pub fn candidate_id(&self) -> EventId {
        self.candidate_id
    }

    /// Message text the analyzer is keyed on
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Call the analyzer for this request
    ///
    /// No timeout is imposed here; callers wrap this future if they need one.
    pub async fn execute(
        &self,
        backend: &dyn AnalyzerBackend,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        info!(
            "Starting analysis of {} with {} backend",
            self.candidate_id,
            backend.name()
        );
        let start_time = Instant::now();

        let result = backend.analyze(&self.message).await;

        let duration = start_time.elapsed();
        match &result {
            Ok(outcome) => info!(
                "Analysis of {} completed in {:?}: classification='{}'",
                self.candidate_id, duration, outcome.classification
            ),
            Err(e) => error!(
                "Analysis of {} failed after {:?}: {}",
                self.candidate_id, duration, e
            ),
        }
        result
    }

    /// Pair a result with this request for `AnalysisCoordinator::complete`
    pub fn complete(
        &self,
        result: Result<AnalysisOutcome, AnalysisError>,
    ) -> AnalysisCompletion {
        AnalysisCompletion {
            candidate_id: self.candidate_id,
            result,
        }
    }
}

/// Result of an analyzer call, tagged with the candidate it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisCompletion {
    pub candidate_id: EventId,
    pub result: Result<AnalysisOutcome, AnalysisError>,
}

/// Owner of the analysis state machine
#[derive(Debug, Default)]
pub struct AnalysisCoordinator {
    state: AnalysisState,
    requests_issued: u64,
}

impl AnalysisCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    /// Number of analyzer calls ever issued
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    /// Move `Idle -> Pending` for the candidate
    ///
    /// Returns the request to execute, or `None` when another candidate is
    /// still active. Nothing is queued in that case.
    pub fn begin(&mut self, candidate: LogEvent) -> Option<AnalysisRequest> {
        if !self.state.is_idle() {
            warn!(
                "Refusing analysis of {} while {} is {}",
                candidate.id,
                self.state.candidate().map(|c| c.id.to_string()).unwrap_or_default(),
                self.state.label()
            );
            return None;
        }

        let request = AnalysisRequest {
            candidate_id: candidate.id,
            message: candidate.message.clone(),
        };
        debug!("Analysis state idle -> pending for {}", candidate.id);
        self.state = AnalysisState::Pending { candidate };
        self.requests_issued += 1;

        Some(request)
    }

    /// Settle the pending candidate with the analyzer result
    ///
    /// Success moves to `Ready`; any error moves to `Failed` with the fallback
    /// outcome. A completion for anything other than the pending candidate is
    /// discarded and `false` is returned.
    pub fn complete(&mut self, completion: AnalysisCompletion) -> bool {
        let candidate = match &self.state {
            AnalysisState::Pending { candidate } if candidate.id == completion.candidate_id => {
                candidate.clone()
            }
            other => {
                warn!(
                    "Discarding analysis result for {}: coordinator is {}",
                    completion.candidate_id,
                    other.label()
                );
                return false;
            }
        };

        self.state = match completion.result {
            Ok(outcome) => {
                debug!("Analysis state pending -> ready for {}", candidate.id);
                AnalysisState::Ready { candidate, outcome }
            }
            Err(e) => {
                warn!(
                    "Analysis of {} failed ({}), using fallback outcome",
                    candidate.id, e
                );
                AnalysisState::Failed {
                    candidate,
                    outcome: AnalysisOutcome::fallback(),
                }
            }
        };
        true
    }

    /// Return to `Idle`, handing back the resolved candidate and outcome
    ///
    /// Only `Ready` and `Failed` resolve; in `Idle` and `Pending` this is a
    /// no-op returning `None`.
    pub fn take_resolved(&mut self) -> Option<(LogEvent, AnalysisOutcome)> {
        if !self.state.is_resolved() {
            return None;
        }

        match std::mem::take(&mut self.state) {
            AnalysisState::Ready { candidate, outcome }
            | AnalysisState::Failed { candidate, outcome } => {
                debug!("Analysis state resolved -> idle for {}", candidate.id);
                Some((candidate, outcome))
            }
            // Guarded by is_resolved above
            AnalysisState::Idle | AnalysisState::Pending { .. } => None,
        }
    }
}
