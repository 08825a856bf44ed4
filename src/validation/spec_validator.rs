//! Publish File Validator - Parses a publish document into a [`PublishSpec`]
//!
//! Validation is aggregating: the whole document is walked and every
//! violation is collected with its field path before anything is returned.
//! A spec is produced only when no violation was found.
//!
//! # Example
//!
//! ```no_run
//! use tao_publisher::validation::spec_validator::read_publish_file;
//! use std::path::Path;
//!
//! # async fn example() -> tao_publisher::core::Result<()> {
//! let spec = read_publish_file(Path::new("publish.yaml")).await?;
//! println!("{} components", spec.components.len());
//! # Ok(())
//! # }
//! ```

use crate::core::error::{PublishError, Result};
use crate::validation::document::{
    ApplicationSpec, ComponentCategory, ComponentSpec, ContainerSpec, DataPort,
    ParameterConstraints, ParameterDescriptor, ParameterType, ParameterValue, PublishSpec,
    SCHEMA_VERSION,
};
use crate::validation::parameter_validator::{check_constraints, coerce, literal_of};
use crate::validation::version_validator::VersionValidator;
use crate::validation::violation::{FieldPath, ValidationErrors, Violation, ViolationKind};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

const ROOT_KEYS: &[&str] = &["schemaVersion", "container", "components"];
const CONTAINER_KEYS: &[&str] = &[
    "id",
    "name",
    "version",
    "description",
    "tag",
    "logo",
    "applications",
];
const APPLICATION_KEYS: &[&str] = &["name", "path", "memoryRequirements", "parallelFlagTemplate"];
const COMPONENT_KEYS: &[&str] = &[
    "id",
    "label",
    "description",
    "version",
    "category",
    "application",
    "parameters",
    "inputs",
    "outputs",
];
const PARAMETER_KEYS: &[&str] = &[
    "name",
    "type",
    "label",
    "description",
    "default",
    "required",
    "constraints",
];
const CONSTRAINT_KEYS: &[&str] = &["min", "max", "allowed"];
const PORT_KEYS: &[&str] = &["name", "format", "cardinality", "location"];

const DEFAULT_TAG: &str = "latest";
const DEFAULT_COMPONENT_VERSION: &str = "1.0.0";
const DEFAULT_PORT_FORMAT: &str = "RASTER";

/// Syntax of a publish file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> std::result::Result<Self, ValidationErrors> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(ValidationErrors::single(
                FieldPath::root(),
                ViolationKind::UnsupportedExtension { extension },
            )),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

/// Read, parse and validate a publish file
///
/// Relative artifact paths are resolved against the file's directory.
pub async fn read_publish_file(path: &Path) -> Result<PublishSpec> {
    let format = DocumentFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "reading publish file");

    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PublishError::io(path, e))?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    Ok(SpecValidator::new(base_dir).parse_str(&text, format)?)
}

/// Validator for publish documents
#[derive(Debug, Clone)]
pub struct SpecValidator {
    base_dir: PathBuf,
    versions: VersionValidator,
}

impl SpecValidator {
    /// Create a validator resolving artifact paths against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            versions: VersionValidator::new(),
        }
    }

    /// Parse document text
    pub fn parse_str(
        &self,
        text: &str,
        format: DocumentFormat,
    ) -> std::result::Result<PublishSpec, ValidationErrors> {
        let root = match format {
            DocumentFormat::Yaml => {
                serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string())
            }
            DocumentFormat::Json => serde_json::from_str::<serde_json::Value>(text)
                .map_err(|e| e.to_string())
                .and_then(|json| serde_yaml::to_value(json).map_err(|e| e.to_string())),
        }
        .map_err(|message| {
            ValidationErrors::single(FieldPath::root(), ViolationKind::Syntax { message })
        })?;

        self.parse_value(&root)
    }

    /// Validate an already parsed document tree
    pub fn parse_value(&self, root: &Value) -> std::result::Result<PublishSpec, ValidationErrors> {
        let mut walk = Walk::new(&self.base_dir, self.versions);
        let root_path = FieldPath::root();

        let Some(map) = walk.mapping(root, &root_path) else {
            return Err(ValidationErrors::new(walk.violations));
        };
        walk.check_keys(map, ROOT_KEYS, &root_path);

        let schema_version = walk.schema_version(map);
        let container = walk.container(map.get("container"));

        let components_path = root_path.key("components");
        let mut seen_ids = HashSet::new();
        let components: Vec<Option<ComponentSpec>> = walk
            .sequence(map, "components", &root_path)
            .iter()
            .enumerate()
            .map(|(i, value)| walk.component(value, &components_path.index(i), &mut seen_ids))
            .collect();

        if !walk.violations.is_empty() {
            return Err(ValidationErrors::new(walk.violations));
        }

        match (container, components.into_iter().collect::<Option<Vec<_>>>()) {
            (Some(container), Some(components)) => Ok(PublishSpec {
                schema_version,
                container,
                components,
                base_dir: self.base_dir.clone(),
            }),
            _ => Err(ValidationErrors::new(walk.violations)),
        }
    }
}

/// Single pass over a document, accumulating violations
struct Walk<'a> {
    base_dir: &'a Path,
    versions: VersionValidator,
    violations: Vec<Violation>,
    application_names: Vec<String>,
}

impl<'a> Walk<'a> {
    fn new(base_dir: &'a Path, versions: VersionValidator) -> Self {
        Self {
            base_dir,
            versions,
            violations: Vec::new(),
            application_names: Vec::new(),
        }
    }

    fn push(&mut self, path: FieldPath, kind: ViolationKind) {
        self.violations.push(Violation::new(path, kind));
    }

    fn wrong_type(&mut self, path: FieldPath, expected: &'static str, found: &Value) {
        self.push(
            path,
            ViolationKind::WrongType {
                expected,
                found: type_name(found).to_string(),
            },
        );
    }

    fn mapping<'v>(&mut self, value: &'v Value, path: &FieldPath) -> Option<&'v Mapping> {
        match value {
            Value::Mapping(map) => Some(map),
            other => {
                self.wrong_type(path.clone(), "mapping", other);
                None
            }
        }
    }

    fn check_keys(&mut self, map: &Mapping, allowed: &[&str], path: &FieldPath) {
        for (key, _) in map.iter() {
            match key.as_str() {
                Some(name) if allowed.contains(&name) => {}
                _ => self.push(path.key(&literal_of(key)), ViolationKind::UnknownKey),
            }
        }
    }

    fn required_str(&mut self, map: &Mapping, key: &str, path: &FieldPath) -> Option<String> {
        let field = path.key(key);
        match map.get(key) {
            None | Some(Value::Null) => {
                self.push(field, ViolationKind::Missing);
                None
            }
            Some(value) => {
                let text = self.scalar_text(value, &field)?;
                if text.trim().is_empty() {
                    self.push(field, ViolationKind::Empty);
                    return None;
                }
                Some(text)
            }
        }
    }

    fn optional_str(&mut self, map: &Mapping, key: &str, path: &FieldPath) -> Option<String> {
        match map.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.scalar_text(value, &path.key(key)),
        }
    }

    /// Strings and integers are accepted where text is expected
    ///
    /// A float has already lost its written form (`1.10` reads as `1.1`), so
    /// it must be quoted.
    fn scalar_text(&mut self, value: &Value, path: &FieldPath) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) if !n.is_f64() => Some(n.to_string()),
            Value::Number(_) => {
                self.wrong_type(path.clone(), "quoted string", value);
                None
            }
            other => {
                self.wrong_type(path.clone(), "string", other);
                None
            }
        }
    }

    fn optional_bool(&mut self, map: &Mapping, key: &str, path: &FieldPath) -> Option<bool> {
        match map.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(other) => {
                self.wrong_type(path.key(key), "bool", other);
                None
            }
        }
    }

    fn optional_count(
        &mut self,
        map: &Mapping,
        key: &str,
        path: &FieldPath,
        minimum: u64,
    ) -> Option<u64> {
        match map.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) if n.as_u64().is_some_and(|v| v >= minimum) => n.as_u64(),
            Some(Value::Number(n)) => {
                self.push(
                    path.key(key),
                    ViolationKind::OutOfRange {
                        literal: n.to_string(),
                        bound: format!("integer >= {}", minimum),
                    },
                );
                None
            }
            Some(other) => {
                self.wrong_type(path.key(key), "integer", other);
                None
            }
        }
    }

    fn sequence<'v>(&mut self, map: &'v Mapping, key: &str, path: &FieldPath) -> &'v [Value] {
        match map.get(key) {
            None | Some(Value::Null) => &[],
            Some(Value::Sequence(items)) => items.as_slice(),
            Some(other) => {
                self.wrong_type(path.key(key), "sequence", other);
                &[]
            }
        }
    }

    fn version(&mut self, text: String, path: FieldPath) -> Option<String> {
        if self.versions.is_well_formed(&text) {
            Some(text)
        } else {
            self.push(path, ViolationKind::InvalidVersion { literal: text });
            None
        }
    }

    fn readable_file(&mut self, declared: &str, path: FieldPath) -> Option<PathBuf> {
        let resolved = self.base_dir.join(declared);
        if resolved.is_file() && File::open(&resolved).is_ok() {
            Some(PathBuf::from(declared))
        } else {
            self.push(
                path,
                ViolationKind::FileNotFound {
                    path: resolved.display().to_string(),
                },
            );
            None
        }
    }

    fn schema_version(&mut self, map: &Mapping) -> u32 {
        match map.get("schemaVersion") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) if n.as_u64() == Some(u64::from(SCHEMA_VERSION)) => {}
            Some(other) => self.push(
                FieldPath::root().key("schemaVersion"),
                ViolationKind::InvalidChoice {
                    literal: literal_of(other),
                    allowed: &["1"],
                },
            ),
        }
        SCHEMA_VERSION
    }

    fn container(&mut self, value: Option<&Value>) -> Option<ContainerSpec> {
        let path = FieldPath::root().key("container");
        let Some(value) = value.filter(|v| !v.is_null()) else {
            self.push(path, ViolationKind::Missing);
            return None;
        };
        let map = self.mapping(value, &path)?;
        self.check_keys(map, CONTAINER_KEYS, &path);

        let id = self.optional_str(map, "id", &path);
        let name = self.required_str(map, "name", &path);
        let version = self
            .required_str(map, "version", &path)
            .and_then(|v| self.version(v, path.key("version")));
        let description = self.optional_str(map, "description", &path).unwrap_or_default();
        let tag = self
            .optional_str(map, "tag", &path)
            .unwrap_or_else(|| DEFAULT_TAG.to_string());

        let mut logo_ok = true;
        let logo = match self.optional_str(map, "logo", &path) {
            Some(declared) => {
                let checked = self.readable_file(&declared, path.key("logo"));
                logo_ok = checked.is_some();
                checked
            }
            None => None,
        };

        let applications_path = path.key("applications");
        let mut seen = HashSet::new();
        let applications: Vec<Option<ApplicationSpec>> = self
            .sequence(map, "applications", &path)
            .iter()
            .enumerate()
            .map(|(i, value)| self.application(value, &applications_path.index(i), &mut seen))
            .collect();

        let applications = applications.into_iter().collect::<Option<Vec<_>>>()?;
        if !logo_ok {
            return None;
        }

        Some(ContainerSpec {
            id,
            name: name?,
            version: version?,
            description,
            tag,
            logo,
            applications,
        })
    }

    fn application(
        &mut self,
        value: &Value,
        path: &FieldPath,
        seen: &mut HashSet<String>,
    ) -> Option<ApplicationSpec> {
        let map = self.mapping(value, path)?;
        self.check_keys(map, APPLICATION_KEYS, path);

        let name = self.required_str(map, "name", path);
        if let Some(name) = &name {
            self.application_names.push(name.clone());
            if !seen.insert(name.clone()) {
                self.push(
                    path.key("name"),
                    ViolationKind::Duplicate {
                        value: name.clone(),
                    },
                );
            }
        }

        let file = self
            .required_str(map, "path", path)
            .and_then(|declared| self.readable_file(&declared, path.key("path")));
        let memory_requirements = self.optional_count(map, "memoryRequirements", path, 1);
        let parallel_flag_template = self.optional_str(map, "parallelFlagTemplate", path);

        Some(ApplicationSpec {
            name: name?,
            path: file?,
            memory_requirements,
            parallel_flag_template,
        })
    }

    fn component(
        &mut self,
        value: &Value,
        path: &FieldPath,
        seen_ids: &mut HashSet<String>,
    ) -> Option<ComponentSpec> {
        let map = self.mapping(value, path)?;
        self.check_keys(map, COMPONENT_KEYS, path);

        let id = self.required_str(map, "id", path);
        if let Some(id) = &id {
            if !seen_ids.insert(id.clone()) {
                self.push(path.key("id"), ViolationKind::Duplicate { value: id.clone() });
            }
        }

        let label = self.required_str(map, "label", path);
        let description = self.optional_str(map, "description", path).unwrap_or_default();
        let version = match self.optional_str(map, "version", path) {
            Some(v) => self.version(v, path.key("version")),
            None => Some(DEFAULT_COMPONENT_VERSION.to_string()),
        };

        let category = match self.optional_str(map, "category", path) {
            None => Some(ComponentCategory::default()),
            Some(literal) => {
                let parsed = ComponentCategory::parse(&literal);
                if parsed.is_none() {
                    self.push(
                        path.key("category"),
                        ViolationKind::InvalidChoice {
                            literal,
                            allowed: ComponentCategory::NAMES,
                        },
                    );
                }
                parsed
            }
        };

        let application = self.optional_str(map, "application", path);
        let application_ok = match &application {
            Some(name) if !self.application_names.contains(name) => {
                self.push(
                    path.key("application"),
                    ViolationKind::UnresolvedReference { name: name.clone() },
                );
                false
            }
            _ => true,
        };

        let parameters_path = path.key("parameters");
        let mut seen_names = HashSet::new();
        let parameters: Vec<Option<ParameterDescriptor>> = self
            .sequence(map, "parameters", path)
            .iter()
            .enumerate()
            .map(|(i, value)| self.parameter(value, &parameters_path.index(i), &mut seen_names))
            .collect();

        let inputs = self.ports(map, "inputs", path);
        let outputs = self.ports(map, "outputs", path);

        let parameters = parameters.into_iter().collect::<Option<Vec<_>>>()?;
        if !application_ok {
            return None;
        }

        Some(ComponentSpec {
            id: id?,
            label: label?,
            description,
            version: version?,
            category: category?,
            application,
            parameters,
            inputs: inputs?,
            outputs: outputs?,
        })
    }

    fn parameter(
        &mut self,
        value: &Value,
        path: &FieldPath,
        seen_names: &mut HashSet<String>,
    ) -> Option<ParameterDescriptor> {
        let map = self.mapping(value, path)?;
        self.check_keys(map, PARAMETER_KEYS, path);

        let name = self.required_str(map, "name", path);
        if let Some(name) = &name {
            if !seen_names.insert(name.clone()) {
                self.push(path.key("name"), ViolationKind::Duplicate { value: name.clone() });
            }
        }

        let param_type = self.required_str(map, "type", path).and_then(|literal| {
            let parsed = ParameterType::parse(&literal);
            if parsed.is_none() {
                self.push(path.key("type"), ViolationKind::UnknownParameterType { literal });
            }
            parsed
        });
        let label = self.optional_str(map, "label", path);
        let description = self.optional_str(map, "description", path);
        let required = self.optional_bool(map, "required", path).unwrap_or(false);

        // Literals can only be checked once the declared type is known
        let param_type = param_type?;

        let mut converted = true;
        let default = match map.get("default") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let value = self.typed(param_type, raw, path.key("default"));
                converted &= value.is_some();
                value
            }
        };

        let constraints = match map.get("constraints") {
            None | Some(Value::Null) => Some(ParameterConstraints::default()),
            Some(raw) => self.constraints(param_type, raw, &path.key("constraints")),
        };
        let constraints = constraints?;

        if converted {
            let found = check_constraints(param_type, &constraints, default.as_ref(), path);
            converted = found.is_empty();
            self.violations.extend(found);
        }

        if !converted {
            return None;
        }

        Some(ParameterDescriptor {
            name: name?,
            param_type,
            label,
            description,
            default,
            required,
            constraints,
        })
    }

    fn typed(
        &mut self,
        declared: ParameterType,
        raw: &Value,
        path: FieldPath,
    ) -> Option<ParameterValue> {
        match coerce(declared, raw) {
            Ok(value) => Some(value),
            Err(literal) => {
                self.push(path, ViolationKind::TypeMismatch { declared, literal });
                None
            }
        }
    }

    fn constraints(
        &mut self,
        declared: ParameterType,
        value: &Value,
        path: &FieldPath,
    ) -> Option<ParameterConstraints> {
        let map = self.mapping(value, path)?;
        self.check_keys(map, CONSTRAINT_KEYS, path);

        let mut complete = true;
        let mut bound = |walk: &mut Self, key: &str| match map.get(key) {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let value = walk.typed(declared, raw, path.key(key));
                complete &= value.is_some();
                value
            }
        };
        let min = bound(self, "min");
        let max = bound(self, "max");

        let allowed_path = path.key("allowed");
        let mut allowed = Vec::new();
        for (i, raw) in self.sequence(map, "allowed", path).iter().enumerate() {
            match self.typed(declared, raw, allowed_path.index(i)) {
                Some(value) => allowed.push(value),
                None => complete = false,
            }
        }

        complete.then_some(ParameterConstraints { min, max, allowed })
    }

    fn ports(&mut self, map: &Mapping, key: &str, path: &FieldPath) -> Option<Vec<DataPort>> {
        let list_path = path.key(key);
        let mut seen = HashSet::new();
        let ports: Vec<Option<DataPort>> = self
            .sequence(map, key, path)
            .iter()
            .enumerate()
            .map(|(i, value)| self.port(value, &list_path.index(i), &mut seen))
            .collect();
        ports.into_iter().collect()
    }

    fn port(
        &mut self,
        value: &Value,
        path: &FieldPath,
        seen: &mut HashSet<String>,
    ) -> Option<DataPort> {
        let map = self.mapping(value, path)?;
        self.check_keys(map, PORT_KEYS, path);

        let name = self.required_str(map, "name", path);
        if let Some(name) = &name {
            if !seen.insert(name.clone()) {
                self.push(path.key("name"), ViolationKind::Duplicate { value: name.clone() });
            }
        }
        let format = self
            .optional_str(map, "format", path)
            .unwrap_or_else(|| DEFAULT_PORT_FORMAT.to_string());
        let cardinality = match map.get("cardinality") {
            None | Some(Value::Null) => Some(1),
            Some(_) => match self.optional_count(map, "cardinality", path, 0) {
                Some(count) => match u32::try_from(count) {
                    Ok(count) => Some(count),
                    Err(_) => {
                        self.push(
                            path.key("cardinality"),
                            ViolationKind::OutOfRange {
                                literal: count.to_string(),
                                bound: format!("max {}", u32::MAX),
                            },
                        );
                        None
                    }
                },
                None => None,
            },
        };
        let location = self.optional_str(map, "location", path);

        Some(DataPort {
            name: name?,
            format,
            cardinality: cardinality?,
            location,
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
