use serde::{Deserialize, Serialize};

/// Classification reported when the analyzer could not produce an outcome
pub const FALLBACK_CLASSIFICATION: &str = "Analysis Failed";

const FALLBACK_ROOT_CAUSE: &str = "The analyzer could not process the request. This might be due to an API error or network issue.";
const FALLBACK_IMPACT: &str = "Unable to provide automated suggestions for the current error.";
const FALLBACK_DESCRIPTION: &str =
    "Retry the analysis manually or check the application logs for more details.";
const FALLBACK_ACTION_LABEL: &str = "Retry";

/// Suggested fix attached to an analysis outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Remediation {
    /// Actionable description of the fix
    pub description: String,
    /// Short label for the action the user confirms
    pub action_label: String,
    /// Example shell command carrying out the fix, if any
    pub command: Option<String>,
}

/// Structured result of analyzing one fault candidate
///
/// Either produced by an external analyzer or substituted by the coordinator
/// as the fallback when the analyzer call fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// Concise category of the error (e.g. "Database Connectivity")
    pub classification: String,
    /// Most likely underlying cause
    pub root_cause: String,
    /// Expected effect on the system or its users
    pub impact: String,
    /// Suggested fix
    pub remediation: Remediation,
}

impl AnalysisOutcome {
    /// Create a new analysis outcome
    pub fn new(
        classification: impl Into<String>,
        root_cause: impl Into<String>,
        impact: impl Into<String>,
        remediation: Remediation,
    ) -> Self {
        Self {
            classification: classification.into(),
            root_cause: root_cause.into(),
            impact: impact.into(),
            remediation,
        }
    }

    /// Deterministic outcome used when analysis fails
    ///
    /// Carries manual-retry guidance and no command.
    pub fn fallback() -> Self {
        Self::new(
            FALLBACK_CLASSIFICATION,
            FALLBACK_ROOT_CAUSE,
            FALLBACK_IMPACT,
            Remediation {
                description: FALLBACK_DESCRIPTION.to_string(),
                action_label: FALLBACK_ACTION_LABEL.to_string(),
                command: None,
            },
        )
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }

    /// Command to display, empty when the analyzer suggested none
    pub fn command(&self) -> &str {
        self.remediation.command.as_deref().unwrap_or("")
    }
}
