//! Core traits for talking to the platform
//!
//! The orchestrator and the session manager only see these seams; the HTTP
//! client implements them, and tests substitute in-memory fakes.

use crate::client::models::{ComponentRecord, ContainerRecord};
use crate::client::pagination::{Page, PageCursor};
use crate::core::error::Result;
use crate::security::session::{Credentials, LoginGrant};
use crate::validation::document::{ApplicationSpec, ComponentSpec, ContainerSpec};
use async_trait::async_trait;
use std::path::Path;

/// Exchanges credentials for a token
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginGrant>;
}

/// Remote registration calls used by the publish pipeline
///
/// Every method is a single, non-idempotent request. Implementations must not
/// retry them.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Register container metadata
    async fn create_container(&self, container: &ContainerSpec) -> Result<ContainerRecord>;

    /// Upload the container logo
    ///
    /// # Arguments
    ///
    /// * `container_id` - Id returned by [`PlatformApi::create_container`]
    /// * `path` - Resolved path of the logo file
    async fn upload_logo(&self, container_id: &str, path: &Path) -> Result<()>;

    /// Upload one application artifact
    async fn upload_application(
        &self,
        container_id: &str,
        application: &ApplicationSpec,
        path: &Path,
    ) -> Result<()>;

    /// Register a component bound to `container_id`
    async fn create_component(
        &self,
        container_id: &str,
        component: &ComponentSpec,
    ) -> Result<ComponentRecord>;
}

/// Anything that can produce the page a cursor points at
#[async_trait]
pub trait PageSource<T: Send>: Send + Sync {
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<T>>;
}
