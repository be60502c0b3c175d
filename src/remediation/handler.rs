use crate::aggregator::EventBuffer;
use crate::ai::AnalysisCoordinator;
use crate::events::{EventDraft, LogEvent};
use log::{debug, info};

/// Source label of events recording an applied fix
pub const REMEDIATION_SOURCE: &str = "aegis-ai";

/// Applies or discards the resolved fault
///
/// Both operations only act when the coordinator holds a `Ready` or `Failed`
/// outcome; otherwise they are no-ops, so repeated user input is harmless.
#[derive(Debug, Clone)]
pub struct RemediationHandler {
    source: String,
}

impl Default for RemediationHandler {
    fn default() -> Self {
        Self::new(REMEDIATION_SOURCE)
    }
}

impl RemediationHandler {
    /// Create a handler recording fixes under the given source label
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Commit the suggested fix
    ///
    /// Writes an INFO event describing the fix back into the buffer, counts
    /// the remediation, and returns the coordinator to `Idle`. Returns the
    /// recorded event, or `None` when there was nothing to apply.
    pub fn apply_fix(
        &self,
        coordinator: &mut AnalysisCoordinator,
        buffer: &mut EventBuffer,
    ) -> Option<LogEvent> {
        let Some((candidate, outcome)) = coordinator.take_resolved() else {
            debug!(
                "apply_fix ignored: analysis is {}",
                coordinator.state().label()
            );
            return None;
        };

        let message = format!(
            "FIX APPLIED: {} for error in {}.",
            outcome.remediation.description, candidate.source
        );
        let event = buffer.push(EventDraft::info(self.source.clone(), message));
        buffer.record_remediation();

        info!(
            "Applied '{}' for {} from {} (remediations: {})",
            outcome.remediation.action_label,
            candidate.id,
            candidate.source,
            buffer.stats().remediation_count
        );
        Some(event)
    }

    /// Discard the resolved fault without recording anything
    ///
    /// Returns whether a fault was discarded.
    pub fn dismiss(&self, coordinator: &mut AnalysisCoordinator) -> bool {
        match coordinator.take_resolved() {
            Some((candidate, _)) => {
                info!("Dismissed {} from {}", candidate.id, candidate.source);
                true
            }
            None => {
                debug!(
                    "dismiss ignored: analysis is {}",
                    coordinator.state().label()
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AnalysisOutcome, Remediation};
    use crate::error::AnalysisError;
    use crate::events::Level;

    fn resolved(
        buffer: &mut EventBuffer,
        result: Result<AnalysisOutcome, AnalysisError>,
    ) -> AnalysisCoordinator {
        let candidate = buffer.push(EventDraft::error(
            "db-connector",
            "Database connection failed: invalid credentials",
        ));
        let mut coordinator = AnalysisCoordinator::new();
        let request = coordinator.begin(candidate).unwrap();
        coordinator.complete(request.complete(result));
        coordinator
    }

    fn outcome() -> AnalysisOutcome {
        AnalysisOutcome::new(
            "Database Connectivity",
            "Invalid credentials",
            "Writes fail",
            Remediation {
                description: "Retried with backup credentials".to_string(),
                action_label: "Retry with Backup Credentials".to_string(),
                command: None,
            },
        )
    }

    #[test]
    fn test_apply_fix_records_event() {
        let mut buffer = EventBuffer::new(10);
        let mut coordinator = resolved(&mut buffer, Ok(outcome()));
        let handler = RemediationHandler::default();

        let event = handler.apply_fix(&mut coordinator, &mut buffer).unwrap();

        assert_eq!(event.level, Level::Info);
        assert_eq!(event.source, "aegis-ai");
        assert_eq!(
            event.message,
            "FIX APPLIED: Retried with backup credentials for error in db-connector."
        );
        assert_eq!(buffer.latest().unwrap().id, event.id);

        let stats = buffer.stats();
        assert_eq!(stats.remediation_count, 1);
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.error_count, 1);
        assert!(coordinator.state().is_idle());
    }

    #[test]
    fn test_apply_fix_after_failure_uses_fallback_guidance() {
        let mut buffer = EventBuffer::new(10);
        let mut coordinator = resolved(&mut buffer, Err(AnalysisError::Timeout));
        let handler = RemediationHandler::default();

        let event = handler.apply_fix(&mut coordinator, &mut buffer).unwrap();
        assert!(event.message.contains("Retry the analysis manually"));
        assert_eq!(buffer.stats().remediation_count, 1);
    }

    #[test]
    fn test_dismiss_leaves_counters_alone() {
        let mut buffer = EventBuffer::new(10);
        let mut coordinator = resolved(&mut buffer, Ok(outcome()));
        let handler = RemediationHandler::default();
        let before = buffer.stats();

        assert!(handler.dismiss(&mut coordinator));

        assert_eq!(buffer.stats(), before);
        assert_eq!(buffer.len(), 1);
        assert!(coordinator.state().is_idle());
    }

    #[test]
    fn test_operations_are_idempotent_when_idle() {
        let mut buffer = EventBuffer::new(10);
        let mut coordinator = resolved(&mut buffer, Ok(outcome()));
        let handler = RemediationHandler::default();

        assert!(handler.apply_fix(&mut coordinator, &mut buffer).is_some());
        let after_first = buffer.snapshot();

        // Duplicate input: both are no-ops now
        assert!(handler.apply_fix(&mut coordinator, &mut buffer).is_none());
        assert!(!handler.dismiss(&mut coordinator));

        assert_eq!(buffer.snapshot(), after_first);
        assert!(coordinator.state().is_idle());
    }

    #[test]
    fn test_operations_ignored_while_pending() {
        let mut buffer = EventBuffer::new(10);
        let candidate = buffer.push(EventDraft::error("db-connector", "down"));
        let mut coordinator = AnalysisCoordinator::new();
        coordinator.begin(candidate).unwrap();
        let handler = RemediationHandler::default();

        assert!(handler.apply_fix(&mut coordinator, &mut buffer).is_none());
        assert!(!handler.dismiss(&mut coordinator));
        assert!(coordinator.state().is_pending());
        assert_eq!(buffer.stats().remediation_count, 0);
    }

    #[test]
    fn test_custom_source_label() {
        let mut buffer = EventBuffer::new(10);
        let mut coordinator = resolved(&mut buffer, Ok(outcome()));
        let handler = RemediationHandler::new("ops-bot");

        let event = handler.apply_fix(&mut coordinator, &mut buffer).unwrap();
        assert_eq!(event.source, "ops-bot");
    }
}
