/// Error types for analysis and configuration
pub mod error;

/// Core event types
pub mod events;

/// Bounded event buffer and aggregate counters
pub mod aggregator;

/// Fault candidate selection
pub mod triggers;

/// Analysis coordinator, outcomes and analyzer backends
pub mod ai;

/// Fix application and dismissal
pub mod remediation;

/// Pipeline tying buffer, selector, coordinator and remediation together
pub mod triage;

/// Configuration management
pub mod config;

/// Event sources
pub mod collectors;

/// Async service loop around the pipeline
pub mod service;

/// Terminal presentation and command input
pub mod console;

// Re-export commonly used types
pub use error::{AnalysisError, ConfigError};
pub use triage::{IngestReport, TriagePipeline};
