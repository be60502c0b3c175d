use crate::ai::backends::AnalyzerBackend;
use crate::ai::{AnalysisOutcome, Remediation};
use crate::error::AnalysisError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What the mock answers with
#[derive(Debug, Clone)]
enum Responses {
    /// Canned outcomes picked from keywords in the message
    Keyword,
    /// Fixed responses returned in order, cycling after the last
    Scripted(Vec<Result<AnalysisOutcome, AnalysisError>>),
}

/// Mock analyzer for testing and offline runs
///
/// Tracks how often it was called and with which message, and can be
/// scripted to succeed, fail, or stall.
#[derive(Debug, Clone)]
pub struct MockBackend {
    responses: Responses,
    current_index: Arc<Mutex<usize>>,
    delay: Option<Duration>,
    call_count: Arc<Mutex<usize>>,
    last_message: Arc<Mutex<Option<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    fn from_responses(responses: Responses) -> Self {
        Self {
            responses,
            current_index: Arc::new(Mutex::new(0)),
            delay: None,
            call_count: Arc::new(Mutex::new(0)),
            last_message: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a mock that always returns the same response
    ///
    /// # Example
    /// ```
    /// use aegis::ai::{AnalysisOutcome, MockBackend};
    ///
    /// let backend = MockBackend::with_response(Ok(AnalysisOutcome::fallback()));
    /// assert_eq!(backend.call_count(), 0);
    /// ```
    pub fn with_response(response: Result<AnalysisOutcome, AnalysisError>) -> Self {
        Self::with_responses(vec![response])
    }

    /// Create a mock with multiple responses
    ///
    /// Responses are returned in order. After the last response,
    /// the mock cycles back to the first one. An empty list behaves like `success()`.
    pub fn with_responses(responses: Vec<Result<AnalysisOutcome, AnalysisError>>) -> Self {
        if responses.is_empty() {
            return Self::success();
        }
        Self::from_responses(Responses::Scripted(responses))
    }

    /// Create a mock that answers every message with a plausible outcome
    pub fn success() -> Self {
        Self::from_responses(Responses::Keyword)
    }

    /// Create a mock that always fails with a backend error
    pub fn error(error_message: impl Into<String>) -> Self {
        Self::with_response(Err(AnalysisError::BackendError(error_message.into())))
    }

    /// Create a mock that simulates timeout errors
    pub fn timeout() -> Self {
        Self::with_response(Err(AnalysisError::Timeout))
    }

    /// Add a delay before every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }

    /// Message passed to the most recent `analyze` call
    pub fn last_message(&self) -> Option<String> {
        lock(&self.last_message).clone()
    }

    /// Reset call tracking and the scripted response cursor
    pub fn reset(&self) {
        *lock(&self.call_count) = 0;
        *lock(&self.last_message) = None;
        *lock(&self.current_index) = 0;
    }

    fn next_response(&self, message: &str) -> Result<AnalysisOutcome, AnalysisError> {
        match &self.responses {
            Responses::Keyword => Ok(keyword_outcome(message)),
            Responses::Scripted(responses) => {
                let mut index = lock(&self.current_index);
                let response = responses[*index % responses.len()].clone();
                *index += 1;
                response
            }
        }
    }
}

/// Canned outcome following the usual SRE playbook for the message
fn keyword_outcome(message: &str) -> AnalysisOutcome {
    let lower = message.to_lowercase();

    let (classification, root_cause, description, action_label, command) =
        if lower.contains("database") || lower.contains("credentials") {
            (
                "Database Connectivity",
                "The database rejected the connection, most likely because the configured credentials are invalid or were rotated.",
                "Retry the connection with the backup credentials and verify firewall rules between the service and the database.",
                "Retry with Backup Credentials",
                Some("kubectl rollout restart deployment/db-connector"),
            )
        } else if lower.contains("null") || lower.contains("parameter") {
            (
                "Invalid Parameter",
                "A required request parameter arrived empty from the calling service.",
                "Check the calling service's payload and add validation for the missing parameter.",
                "Inspect Caller Payload",
                None,
            )
        } else if lower.contains("timeout") || lower.contains("timed out") {
            (
                "Service Timeout",
                "The downstream service did not answer within the configured timeout.",
                "Increase the timeout configuration and check the downstream service's health.",
                "Increase Timeout",
                Some("kubectl scale deployment/payment-gateway --replicas=3"),
            )
        } else {
            (
                "Unclassified Error",
                "The error does not match a known failure pattern.",
                "Review the surrounding log events for the failing service.",
                "Acknowledge",
                None,
            )
        };

    AnalysisOutcome::new(
        classification,
        root_cause,
        "Requests handled by the affected service may fail until the fault is resolved.",
        Remediation {
            description: description.to_string(),
            action_label: action_label.to_string(),
            command: command.map(str::to_string),
        },
    )
}

impl AnalyzerBackend for MockBackend {
    fn analyze<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisOutcome, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            *lock(&self.call_count) += 1;
            *lock(&self.last_message) = Some(message.to_string());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.next_response(message)
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
