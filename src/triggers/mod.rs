/// Fault selection for ingested events
pub mod fault_selector;

pub use fault_selector::{FaultSelector, Selection};
