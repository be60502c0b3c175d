//! Core event types for the triage pipeline
//!
//! This module defines the log event record that flows from an event source
//! into the event buffer, and the draft shape sources hand to `ingest`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Identity of an ingested event
///
/// Assigned by the event buffer in arrival order, so a larger id always
/// means a later arrival.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Severity of a log event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Informational message
    Info,
    /// Something looks off but nothing failed
    Warn,
    /// A fault; the only level that can become a fault candidate
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log event as stored in the event buffer
///
/// Immutable once created; the buffer hands out clones, never `&mut`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    /// Arrival-ordered identity
    pub id: EventId,
    /// When the event was ingested
    pub timestamp: Timestamp,
    /// Severity of the event
    pub level: Level,
    /// Service or component that emitted the event
    pub source: String,
    /// The actual log message content
    pub message: String,
}

impl LogEvent {
    /// Whether this event is eligible for fault analysis
    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

/// Event as supplied by an event source, before identity and timestamp are assigned
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventDraft {
    pub level: Level,
    pub source: String,
    pub message: String,
}

impl EventDraft {
    pub fn new(level: Level, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn info(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Info, source, message)
    }

    pub fn warn(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Warn, source, message)
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Error, source, message)
    }
}
