//! Multipart encoding of artifact uploads

use crate::core::error::{PublishError, Result};
use reqwest::multipart::{Form, Part};
use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Lowercase, with every run of non-alphanumeric characters collapsed to `-`
///
/// # Examples
///
/// ```
/// use tao_publisher::client::multipart::slugify;
///
/// assert_eq!(slugify("My Script (v2)"), "my-script-v2");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Server-safe file name: slugified stem, slugified extension
pub fn normalize_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| slugify(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "file".to_string());

    match path
        .extension()
        .map(|e| slugify(&e.to_string_lossy()))
        .filter(|e| !e.is_empty())
    {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Content type by extension, octet stream when unknown
pub fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Read `path` into a `file` part with normalized name and inferred type
pub async fn file_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PublishError::io(path, e))?;

    Part::bytes(bytes)
        .file_name(normalize_filename(path))
        .mime_str(&content_type(path))
        .map_err(PublishError::from)
}

/// Form carrying only the file
pub async fn file_form(path: &Path) -> Result<Form> {
    Ok(Form::new().part("file", file_part(path).await?))
}

/// Form for an application artifact: file plus its declared name
pub async fn application_form(name: &str, path: &Path) -> Result<Form> {
    Ok(file_form(path).await?.text("name", name.to_string()))
}
