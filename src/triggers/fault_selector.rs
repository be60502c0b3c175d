use crate::ai::AnalysisState;
use crate::events::LogEvent;
use log::debug;

/// Decision taken for one ingested event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Not an ERROR event; nothing to analyze
    NotAFault,
    /// ERROR event arriving while idle; becomes the fault candidate
    Promote,
    /// ERROR event arriving while another fault is active; dropped for analysis
    SkipBusy,
}

/// Decides which ingested errors become fault candidates
///
/// Promotion is gated only on the analysis state being `Idle`. Errors that
/// arrive while busy are not queued and not retried.
#[derive(Debug, Default)]
pub struct FaultSelector {
    promoted: u64,
    skipped_while_busy: u64,
}

impl FaultSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an event against the current analysis state
    pub fn select(&mut self, event: &LogEvent, state: &AnalysisState) -> Selection {
        if !event.is_error() {
            return Selection::NotAFault;
        }

        if state.is_idle() {
            self.promoted += 1;
            Selection::Promote
        } else {
            self.skipped_while_busy += 1;
            debug!(
                "Skipping {} from {}: analysis is {}",
                event.id,
                event.source,
                state.label()
            );
            Selection::SkipBusy
        }
    }

    /// Errors promoted to fault candidates so far
    pub fn promoted_count(&self) -> u64 {
        self.promoted
    }

    /// Errors dropped because a fault was already active
    pub fn skipped_count(&self) -> u64 {
        self.skipped_while_busy
    }
}
