//! Event buffer with bounded newest-first retention
//!
//! This module provides the EventBuffer which stores the most recent log events
//! up to a fixed capacity and owns the aggregate counters derived from them.

use crate::events::{EventDraft, EventId, Level, LogEvent};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of events retained by the buffer
pub const DEFAULT_CAPACITY: usize = 100;

/// Aggregate counters for everything the buffer has ever seen
///
/// Counters only grow. Derived figures such as the health percentage are
/// computed on read and never stored.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateStats {
    /// Events ever ingested, including remediation records
    pub total_events: u64,
    /// ERROR-level events ever ingested
    pub error_count: u64,
    /// Remediations committed through `apply_fix`
    pub remediation_count: u64,
}

impl AggregateStats {
    /// Events ingested at INFO or WARN level
    pub fn non_error_count(&self) -> u64 {
        self.total_events - self.error_count
    }

    /// Share of non-error events as a percentage (0-100)
    ///
    /// An empty history counts as fully healthy.
    pub fn health_percent(&self) -> f64 {
        if self.total_events == 0 {
            return 100.0;
        }
        self.non_error_count() as f64 / self.total_events as f64 * 100.0
    }
}

/// Consistent copy of the buffer contents and counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferSnapshot {
    /// Retained events, newest first
    pub events: Vec<LogEvent>,
    /// Counters as of the same instant as `events`
    pub stats: AggregateStats,
}

/// Bounded, ordered store of ingested log events
///
/// New events go to the front; once `capacity` is exceeded the oldest event
/// is evicted from the back. Eviction is silent and never surfaced to callers.
#[derive(Debug)]
pub struct EventBuffer {
    /// Retained events, newest at the front
    events: VecDeque<LogEvent>,
    /// Maximum number of retained events
    capacity: usize,
    /// Counters over the whole ingestion history
    stats: AggregateStats,
    /// Next identity to assign
    next_id: u64,
}

impl EventBuffer {
    /// Create a new EventBuffer retaining at most `capacity` events
    ///
    /// A capacity of zero is raised to one so the newest event is always visible.
    ///
    /// # Examples
    ///
    /// ```
    /// use aegis::aggregator::EventBuffer;
    ///
    /// let buffer = EventBuffer::new(100);
    /// assert!(buffer.is_empty());
    /// ```
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            stats: AggregateStats::default(),
            next_id: 1,
        }
    }

    /// Ingest an event from a source
    ///
    /// Assigns identity and timestamp, places the event at the front, evicts
    /// past capacity, and updates the counters in the same step.
    pub fn push(&mut self, draft: EventDraft) -> LogEvent {
        let event = LogEvent {
            id: EventId(self.next_id),
            timestamp: Utc::now(),
            level: draft.level,
            source: draft.source,
            message: draft.message,
        };
        self.next_id += 1;

        self.events.push_front(event.clone());
        self.events.truncate(self.capacity);

        self.stats.total_events += 1;
        if event.level == Level::Error {
            self.stats.error_count += 1;
        }

        event
    }

    /// Count a committed remediation
    pub(crate) fn record_remediation(&mut self) {
        self.stats.remediation_count += 1;
    }

    /// Copy of the retained events and counters
    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            events: self.events.iter().cloned().collect(),
            stats: self.stats,
        }
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    /// Iterate retained events, newest first
    pub fn iter(&self) -> impl Iterator<Item = &LogEvent> {
        self.events.iter()
    }

    /// Most recently ingested event still retained
    pub fn latest(&self) -> Option<&LogEvent> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
