pub mod client;
pub mod core;
pub mod orchestration;
pub mod security;
pub mod validation;

pub use client::{ApiClient, ResourceKind};
pub use crate::core::*;
pub use orchestration::{
    CancelFlag, OutcomeReport, OutcomeStatus, PublishOptions, RegistrationOrchestrator,
    publish_file,
};
pub use security::{Credentials, SessionManager, SessionState};
pub use validation::{PublishSpec, SpecValidator, ValidationErrors, read_publish_file};
