/// Analysis coordinator, outcome types and analyzer backends
pub mod backends;
pub mod coordinator;
pub mod mock;
pub mod outcome;

pub use backends::{AnalyzerBackend, GeminiBackend, OllamaBackend, OpenAIBackend};
pub use coordinator::{AnalysisCompletion, AnalysisCoordinator, AnalysisRequest, AnalysisState};
pub use mock::MockBackend;
pub use outcome::{AnalysisOutcome, Remediation, FALLBACK_CLASSIFICATION};
