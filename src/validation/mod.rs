pub mod document;
pub mod parameter_validator;
pub mod spec_validator;
pub mod version_validator;
pub mod violation;

pub use document::{
    ApplicationSpec, ComponentCategory, ComponentSpec, ContainerSpec, DataPort,
    ParameterConstraints, ParameterDescriptor, ParameterType, ParameterValue, PublishSpec,
};
pub use spec_validator::{DocumentFormat, SpecValidator, read_publish_file};
pub use version_validator::{VersionValidationResult, VersionValidator};
pub use violation::{FieldPath, ValidationErrors, Violation, ViolationKind};
