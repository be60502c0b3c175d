/// Event sources feeding the triage pipeline
pub mod synthetic;

pub use synthetic::{predefined_events, SyntheticSource};
