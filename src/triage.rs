//! Triage pipeline: the single authority over buffer, counters and analysis state
//!
//! Every mutation goes through `&mut TriagePipeline`, so ingestion, analysis
//! completion and remediation are serialized on one timeline. The analyzer
//! call itself happens outside: `ingest` hands back an `AnalysisRequest` and
//! the caller later feeds the result into `complete_analysis`.

use crate::aggregator::{AggregateStats, BufferSnapshot, EventBuffer};
use crate::ai::{AnalysisCompletion, AnalysisCoordinator, AnalysisRequest, AnalysisState};
use crate::events::{EventDraft, LogEvent};
use crate::remediation::RemediationHandler;
use crate::triggers::{FaultSelector, Selection};
use log::{debug, info};

/// What happened to one ingested event
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// The event as stored
    pub event: LogEvent,
    /// Analyzer call to issue when the event became the fault candidate
    pub promoted: Option<AnalysisRequest>,
}

pub struct TriagePipeline {
    buffer: EventBuffer,
    selector: FaultSelector,
    coordinator: AnalysisCoordinator,
    remediation: RemediationHandler,
}

impl TriagePipeline {
    /// Create a pipeline retaining at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self::with_handler(capacity, RemediationHandler::default())
    }

    pub fn with_handler(capacity: usize, remediation: RemediationHandler) -> Self {
        Self {
            buffer: EventBuffer::new(capacity),
            selector: FaultSelector::new(),
            coordinator: AnalysisCoordinator::new(),
            remediation,
        }
    }

    /// Ingest one event from the source
    ///
    /// The event is always stored and counted. If it is an ERROR and no
    /// fault is active it becomes the candidate and the returned report
    /// carries the analyzer request to execute.
    pub fn ingest(&mut self, draft: EventDraft) -> IngestReport {
        let event = self.buffer.push(draft);

        let promoted = match self.selector.select(&event, self.coordinator.state()) {
            Selection::Promote => self.coordinator.begin(event.clone()),
            Selection::SkipBusy | Selection::NotAFault => None,
        };

        if let Some(request) = &promoted {
            info!(
                "Fault {} from {} selected for analysis",
                request.candidate_id(),
                event.source
            );
        }

        IngestReport { event, promoted }
    }

    /// Settle the pending analysis with its result
    ///
    /// Returns whether the completion matched the pending candidate.
    pub fn complete_analysis(&mut self, completion: AnalysisCompletion) -> bool {
        self.coordinator.complete(completion)
    }

    /// Commit the suggested fix of the resolved fault
    ///
    /// No-op returning `None` unless the analysis is `Ready` or `Failed`.
    pub fn apply_fix(&mut self) -> Option<LogEvent> {
        self.remediation
            .apply_fix(&mut self.coordinator, &mut self.buffer)
    }

    /// Discard the resolved fault
    ///
    /// No-op returning `false` unless the analysis is `Ready` or `Failed`;
    /// in particular a dismiss while `Pending` does nothing.
    pub fn dismiss(&mut self) -> bool {
        if self.coordinator.state().is_pending() {
            debug!("dismiss while pending is not supported; waiting for the analyzer");
        }
        self.remediation.dismiss(&mut self.coordinator)
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        self.buffer.snapshot()
    }

    pub fn stats(&self) -> AggregateStats {
        self.buffer.stats()
    }

    pub fn state(&self) -> &AnalysisState {
        self.coordinator.state()
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn selector(&self) -> &FaultSelector {
        &self.selector
    }

    pub fn coordinator(&self) -> &AnalysisCoordinator {
        &self.coordinator
    }
}

impl Default for TriagePipeline {
    fn default() -> Self {
        Self::new(crate::aggregator::DEFAULT_CAPACITY)
    }
}
