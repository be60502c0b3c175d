/// Human-gated remediation of analyzed faults
pub mod handler;

pub use handler::{RemediationHandler, REMEDIATION_SOURCE};
