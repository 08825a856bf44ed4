//! Orchestration layer
//!
//! Sequences the remote registration calls of a publish run and collects
//! their outcomes.

pub mod publisher;
pub mod report;
pub mod template;

pub use publisher::{CancelFlag, PublishOptions, RegistrationOrchestrator, publish_file};
pub use report::{EntityRef, OutcomeEntry, OutcomeReport, OutcomeStatus};
pub use template::{example_spec, init_project};
