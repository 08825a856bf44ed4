//! Typed publish-file model
//!
//! A [`PublishSpec`] is only ever produced by the validator, so every value
//! reachable from it already satisfies the document invariants.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Only accepted value of `schemaVersion`
pub const SCHEMA_VERSION: u32 = 1;

/// Declared type of a component parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Int,
    Float,
    Bool,
    Date,
}

impl ParameterType {
    pub const NAMES: &'static [&'static str] = &["string", "int", "float", "bool", "date"];

    pub fn parse(literal: &str) -> Option<Self> {
        match literal {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
        }
    }

    /// Whether `min`/`max` constraints make sense for this type
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Date)
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter literal converted to its declared type
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl ParameterValue {
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Self::String(_) => ParameterType::String,
            Self::Int(_) => ParameterType::Int,
            Self::Float(_) => ParameterType::Float,
            Self::Bool(_) => ParameterType::Bool,
            Self::Date(_) | Self::DateTime(_) => ParameterType::Date,
        }
    }

    /// Order two values of the same ordered type; `None` otherwise
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::DateTime(b)) => Some(a.cmp(&b.date_naive())),
            (Self::DateTime(a), Self::Date(b)) => Some(a.date_naive().cmp(b)),
            _ => None,
        }
    }

    /// JSON form sent to the platform; dates travel as ISO-8601 strings
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::from(s.as_str()),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Bool(b) => serde_json::Value::from(*b),
            Self::Date(_) | Self::DateTime(_) => serde_json::Value::from(self.to_string()),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
        }
    }
}

impl Serialize for ParameterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Date(_) | Self::DateTime(_) => serializer.collect_str(self),
        }
    }
}

/// Optional bounds and allowed set of a parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<ParameterValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<ParameterValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<ParameterValue>,
}

impl ParameterConstraints {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.allowed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ParameterValue>,
    pub required: bool,
    #[serde(skip_serializing_if = "ParameterConstraints::is_empty")]
    pub constraints: ParameterConstraints,
}

/// Input or output port of a component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPort {
    pub name: String,
    pub format: String,
    pub cardinality: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentCategory {
    Raster,
    Vector,
    Optical,
    Radar,
    Misc,
}

impl ComponentCategory {
    pub const NAMES: &'static [&'static str] = &["RASTER", "VECTOR", "OPTICAL", "RADAR", "MISC"];

    pub fn parse(literal: &str) -> Option<Self> {
        match literal.to_ascii_uppercase().as_str() {
            "RASTER" => Some(Self::Raster),
            "VECTOR" => Some(Self::Vector),
            "OPTICAL" => Some(Self::Optical),
            "RADAR" => Some(Self::Radar),
            "MISC" => Some(Self::Misc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raster => "RASTER",
            Self::Vector => "VECTOR",
            Self::Optical => "OPTICAL",
            Self::Radar => "RADAR",
            Self::Misc => "MISC",
        }
    }
}

impl Default for ComponentCategory {
    fn default() -> Self {
        Self::Raster
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub id: String,
    pub label: String,
    pub description: String,
    pub version: String,
    pub category: ComponentCategory,
    /// Name of the container application this component runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    pub parameters: Vec<ParameterDescriptor>,
    pub inputs: Vec<DataPort>,
    pub outputs: Vec<DataPort>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub name: String,
    /// Path as written in the document, relative to the document directory
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_requirements: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_flag_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub version: String,
    pub description: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<PathBuf>,
    pub applications: Vec<ApplicationSpec>,
}

/// Root of a validated publish file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSpec {
    pub schema_version: u32,
    pub container: ContainerSpec,
    pub components: Vec<ComponentSpec>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl PublishSpec {
    /// Absolute location of a path declared in the document
    pub fn resolve(&self, declared: &Path) -> PathBuf {
        self.base_dir.join(declared)
    }

    pub fn logo_path(&self) -> Option<PathBuf> {
        self.container.logo.as_deref().map(|logo| self.resolve(logo))
    }

    pub fn component(&self, id: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Render back to a YAML publish document
    pub fn to_document(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_type_parse() {
        assert_eq!(ParameterType::parse("int"), Some(ParameterType::Int));
        assert_eq!(ParameterType::parse("date"), Some(ParameterType::Date));
        assert_eq!(ParameterType::parse("integer"), None);
        assert!(ParameterType::Float.is_ordered());
        assert!(!ParameterType::Bool.is_ordered());
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(
            ParameterValue::Int(3).compare(&ParameterValue::Int(5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            ParameterValue::Float(2.5).compare(&ParameterValue::Int(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            ParameterValue::Bool(true).compare(&ParameterValue::Bool(false)),
            None
        );
    }

    #[test]
    fn test_value_json_form() {
        let date = ParameterValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(date.to_json(), serde_json::json!("2024-03-01"));
        assert_eq!(ParameterValue::Int(7).to_json(), serde_json::json!(7));
        assert_eq!(ParameterValue::Float(1.0).to_string(), "1.0");
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!(ComponentCategory::parse("optical"), Some(ComponentCategory::Optical));
        assert_eq!(ComponentCategory::parse("LIDAR"), None);
        assert_eq!(ComponentCategory::default().as_str(), "RASTER");
    }
}
