/// Bounded event buffer and aggregate counters
pub mod event_buffer;

pub use event_buffer::{AggregateStats, BufferSnapshot, EventBuffer, DEFAULT_CAPACITY};
