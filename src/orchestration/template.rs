//! Example publish file generation

use crate::client::multipart::slugify;
use crate::core::error::{PublishError, Result};
use crate::validation::document::{
    ApplicationSpec, ComponentCategory, ComponentSpec, ContainerSpec, DataPort,
    ParameterConstraints, ParameterDescriptor, ParameterType, ParameterValue, PublishSpec,
    SCHEMA_VERSION,
};
use crate::validation::spec_validator::DocumentFormat;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// File name of the generated publish file, without extension
pub const PUBLISH_FILE_STEM: &str = "publish";

const SCRIPT_PATH: &str = "bin/run.sh";

const SCRIPT: &str = "#!/bin/sh\n\
# Entry point of the example application.\n\
set -eu\n\
echo \"processing $*\"\n";

/// Example spec for a container called `name`
///
/// The container gets a fresh id so that re-running `init` never collides
/// with an existing registration.
pub fn example_spec(name: &str) -> PublishSpec {
    let slug = match slugify(name) {
        s if s.is_empty() => "container".to_string(),
        s => s,
    };

    let parameters = vec![
        ParameterDescriptor {
            name: "bands".to_string(),
            param_type: ParameterType::Int,
            label: Some("Band count".to_string()),
            description: None,
            default: Some(ParameterValue::Int(4)),
            required: true,
            constraints: ParameterConstraints {
                min: Some(ParameterValue::Int(1)),
                max: Some(ParameterValue::Int(16)),
                allowed: Vec::new(),
            },
        },
        ParameterDescriptor {
            name: "method".to_string(),
            param_type: ParameterType::String,
            label: None,
            description: Some("Resampling method".to_string()),
            default: Some(ParameterValue::String("nearest".to_string())),
            required: false,
            constraints: ParameterConstraints {
                allowed: ["nearest", "bilinear", "cubic"]
                    .into_iter()
                    .map(|m| ParameterValue::String(m.to_string()))
                    .collect(),
                ..Default::default()
            },
        },
        ParameterDescriptor {
            name: "since".to_string(),
            param_type: ParameterType::Date,
            label: None,
            description: None,
            default: NaiveDate::from_ymd_opt(2024, 1, 1).map(ParameterValue::Date),
            required: false,
            constraints: ParameterConstraints::default(),
        },
    ];

    let port = |name: &str| DataPort {
        name: name.to_string(),
        format: "RASTER".to_string(),
        cardinality: 1,
        location: None,
    };

    PublishSpec {
        schema_version: SCHEMA_VERSION,
        container: ContainerSpec {
            id: Some(Uuid::new_v4().to_string()),
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: format!("{} processing tools", name),
            tag: "latest".to_string(),
            logo: None,
            applications: vec![ApplicationSpec {
                name: "run".to_string(),
                path: PathBuf::from(SCRIPT_PATH),
                memory_requirements: Some(512),
                parallel_flag_template: None,
            }],
        },
        components: vec![ComponentSpec {
            id: format!("{}-example", slug),
            label: format!("{} example", name),
            description: "Example component, edit before publishing".to_string(),
            version: "1.0.0".to_string(),
            category: ComponentCategory::Raster,
            application: Some("run".to_string()),
            parameters,
            inputs: vec![port("source")],
            outputs: vec![port("result")],
        }],
        base_dir: PathBuf::new(),
    }
}

/// Render a spec in the given document syntax
pub fn render(spec: &PublishSpec, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Yaml => spec
            .to_document()
            .map_err(|e| PublishError::protocol(format!("cannot render document: {}", e))),
        DocumentFormat::Json => serde_json::to_string_pretty(spec)
            .map(|mut text| {
                text.push('\n');
                text
            })
            .map_err(|e| PublishError::protocol(format!("cannot render document: {}", e))),
    }
}

/// Write an example publish file and its script into `dir`
///
/// Refuses to overwrite an existing publish file. Returns the path written.
pub async fn init_project(name: &str, dir: &Path, format: DocumentFormat) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", PUBLISH_FILE_STEM, format.extension()));
    if tokio::fs::try_exists(&path)
        .await
        .map_err(|e| PublishError::io(&path, e))?
    {
        return Err(PublishError::Io {
            path: path.display().to_string(),
            message: "already exists, refusing to overwrite".to_string(),
        });
    }

    let document = render(&example_spec(name), format)?;

    let script = dir.join(SCRIPT_PATH);
    if let Some(parent) = script.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PublishError::io(parent, e))?;
    }
    if !tokio::fs::try_exists(&script).await.unwrap_or(false) {
        tokio::fs::write(&script, SCRIPT)
            .await
            .map_err(|e| PublishError::io(&script, e))?;
    }

    tokio::fs::write(&path, document)
        .await
        .map_err(|e| PublishError::io(&path, e))?;
    info!(path = %path.display(), "example publish file written");

    Ok(path)
}
