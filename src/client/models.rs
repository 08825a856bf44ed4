//! Wire types exchanged with the platform

use crate::validation::document::{
    ComponentSpec, ContainerSpec, DataPort, ParameterDescriptor,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Envelope status of a successful call
pub const STATUS_SUCCEEDED: &str = "SUCCEEDED";

/// Every response body is wrapped in this envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub total_count: Option<u64>,
}

impl Envelope {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some(STATUS_SUCCEEDED)
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default, alias = "authToken")]
    pub token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A registered container as listed by the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// A registered component as listed by the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub container_id: Option<String>,
}

/// Ids are strings on newer platforms and integers on older ones
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContainer<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    pub name: &'a str,
    pub version: &'a str,
    pub description: &'a str,
    pub tag: &'a str,
}

impl<'a> From<&'a ContainerSpec> for NewContainer<'a> {
    fn from(spec: &'a ContainerSpec) -> Self {
        Self {
            id: spec.id.as_deref(),
            name: &spec.name,
            version: &spec.version,
            description: &spec.description,
            tag: &spec.tag,
        }
    }
}

/// Parameter with its default already resolved to the typed form
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireParameter<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub param_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<serde_json::Value>,
}

impl<'a> From<&'a ParameterDescriptor> for WireParameter<'a> {
    fn from(param: &'a ParameterDescriptor) -> Self {
        Self {
            name: &param.name,
            param_type: param.param_type.as_str(),
            label: param.label.as_deref(),
            description: param.description.as_deref(),
            default_value: param.default.as_ref().map(|v| v.to_json()),
            required: param.required,
            min: param.constraints.min.as_ref().map(|v| v.to_json()),
            max: param.constraints.max.as_ref().map(|v| v.to_json()),
            allowed_values: param.constraints.allowed.iter().map(|v| v.to_json()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePort<'a> {
    pub name: &'a str,
    pub format: &'a str,
    pub cardinality: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<&'a str>,
}

impl<'a> From<&'a DataPort> for WirePort<'a> {
    fn from(port: &'a DataPort) -> Self {
        Self {
            name: &port.name,
            format: &port.format,
            cardinality: port.cardinality,
            location: port.location.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComponent<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub description: &'a str,
    pub version: &'a str,
    pub category: &'static str,
    pub container_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<&'a str>,
    pub parameters: Vec<WireParameter<'a>>,
    pub inputs: Vec<WirePort<'a>>,
    pub outputs: Vec<WirePort<'a>>,
}

impl<'a> NewComponent<'a> {
    pub fn new(container_id: &'a str, spec: &'a ComponentSpec) -> Self {
        Self {
            id: &spec.id,
            label: &spec.label,
            description: &spec.description,
            version: &spec.version,
            category: spec.category.as_str(),
            container_id,
            application: spec.application.as_deref(),
            parameters: spec.parameters.iter().map(WireParameter::from).collect(),
            inputs: spec.inputs.iter().map(WirePort::from).collect(),
            outputs: spec.outputs.iter().map(WirePort::from).collect(),
        }
    }
}
