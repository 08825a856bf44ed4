//! HTTP client for the processing platform
//!
//! Builds authenticated requests, decodes the response envelope and maps
//! failures onto [`PublishError`]. Reads are retried on transport failures;
//! creates, uploads and deletes are sent exactly once.

pub mod models;
pub mod multipart;
pub mod pagination;

use crate::core::config::ClientConfig;
use crate::core::error::{PublishError, Result};
use crate::core::retry::{RetryManager, RetryOptions};
use crate::core::traits::{Authenticator, PageSource, PlatformApi};
use crate::security::session::{AuthSession, Credentials, LoginGrant, SessionManager};
use crate::validation::document::{ApplicationSpec, ComponentSpec, ContainerSpec};
use async_trait::async_trait;
use models::{
    ComponentRecord, ContainerRecord, Envelope, LoginData, LoginRequest, NewComponent,
    NewContainer, STATUS_SUCCEEDED,
};
use pagination::{Page, PageCursor};
use reqwest::{RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Header carrying the session token
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Listable resource collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Container,
    Component,
}

impl ResourceKind {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Component => "component",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    sessions: Arc<SessionManager>,
    retry: RetryManager,
}

impl ApiClient {
    /// Create a client for `base_url`
    ///
    /// # Arguments
    ///
    /// * `base_url` - Platform root, e.g. `https://tao.example.org/api`
    /// * `timeout` - Per-request timeout
    /// * `sessions` - Session manager providing tokens
    pub fn new(base_url: &str, timeout: Duration, sessions: Arc<SessionManager>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| PublishError::config(format!("invalid platform URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PublishError::config(format!(
                "platform URL {} cannot carry a path",
                base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tao-publisher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            sessions,
            retry: RetryManager::default(),
        })
    }

    pub fn from_config(config: &ClientConfig, sessions: Arc<SessionManager>) -> Result<Self> {
        Ok(Self::new(config.base_url()?, config.timeout(), sessions)?
            .with_retry(config.retry_options()))
    }

    /// Retry policy for idempotent reads
    pub fn with_retry(mut self, options: RetryOptions) -> Self {
        self.retry = RetryManager::new(options);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Log in and store the new session in the session manager
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession> {
        self.sessions.login(self, credentials).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PublishError::config("platform URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder, token: &SecretString) -> RequestBuilder {
        request.header(AUTH_HEADER, token.expose_secret())
    }

    /// Send one request and decode its envelope
    async fn execute(&self, request: RequestBuilder) -> Result<Envelope> {
        let request = request.build()?;
        debug!(method = %request.method(), url = %request.url(), "sending request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "received response");

        interpret(status, &body)
    }

    /// One page of a resource collection
    ///
    /// Sort parameters are only sent together with explicit pagination.
    pub async fn list<T>(&self, kind: ResourceKind, cursor: &PageCursor) -> Result<Page<T>>
    where
        T: DeserializeOwned + Send,
    {
        let token = self.sessions.current_token().await?;
        let url = self.endpoint(&[kind.path()])?;
        let query = cursor.query();

        let envelope = self
            .retry
            .retry(|| {
                let request = self.authorized(self.http.get(url.clone()).query(&query), &token);
                async move { self.execute(request).await }
            })
            .await?;

        let total_count = envelope.total_count;
        Ok(Page {
            items: decode_list(envelope.data)?,
            cursor: cursor.clone(),
            total_count,
        })
    }

    /// Every item of a collection in one unpaginated request
    pub async fn list_all<T>(&self, kind: ResourceKind) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let token = self.sessions.current_token().await?;
        let url = self.endpoint(&[kind.path()])?;

        let envelope = self
            .retry
            .retry(|| {
                let request = self.authorized(self.http.get(url.clone()), &token);
                async move { self.execute(request).await }
            })
            .await?;

        decode_list(envelope.data)
    }

    /// One resource by id
    pub async fn get<T>(&self, kind: ResourceKind, id: &str) -> Result<T>
    where
        T: DeserializeOwned + Default + Send,
    {
        let token = self.sessions.current_token().await?;
        let url = self.endpoint(&[kind.path(), id])?;

        let envelope = self
            .retry
            .retry(|| {
                let request = self.authorized(self.http.get(url.clone()), &token);
                async move { self.execute(request).await }
            })
            .await?;

        decode_data(envelope.data)
    }

    /// Delete one resource
    ///
    /// Sent exactly once: a timed-out delete may still have been applied.
    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()> {
        let token = self.sessions.current_token().await?;
        let url = self.endpoint(&[kind.path(), id])?;
        let request = self.authorized(self.http.delete(url), &token);

        self.execute(request).await.map(|_| ())
    }

    /// Page source over one collection, for use with a paginator
    pub fn listing<T>(&self, kind: ResourceKind) -> Listing<'_, T> {
        Listing {
            client: self,
            kind,
            _item: PhantomData,
        }
    }

    async fn upload(
        &self,
        token: &SecretString,
        segments: &[&str],
        form: reqwest::multipart::Form,
    ) -> Result<()> {
        let request = self.authorized(self.http.post(self.endpoint(segments)?), token);
        self.execute(request.multipart(form)).await.map(|_| ())
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("retry", self.retry.options())
            .finish_non_exhaustive()
    }
}

/// Map status and body onto an envelope or an error
///
/// * 2xx with `SUCCEEDED` is the only success.
/// * Any other decodable envelope with a message is an [`PublishError::Api`]
///   carrying that message unchanged.
/// * Anything undecodable is a [`PublishError::Protocol`].
pub fn interpret(status: StatusCode, body: &str) -> Result<Envelope> {
    let envelope = match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(PublishError::protocol(format!("malformed response body: {}", e)));
        }
        Err(_) => {
            return Err(PublishError::protocol(format!(
                "HTTP {} with undecodable body",
                status.as_u16()
            )));
        }
    };

    if status.is_success() {
        return match envelope.status.as_deref() {
            Some(STATUS_SUCCEEDED) => Ok(envelope),
            Some(other) => Err(PublishError::Api {
                status: status.as_u16(),
                message: envelope.message.clone().unwrap_or_else(|| other.to_string()),
            }),
            None => Err(PublishError::protocol("response envelope has no status")),
        };
    }

    match envelope.message {
        Some(message) => Err(PublishError::Api {
            status: status.as_u16(),
            message,
        }),
        None => Err(PublishError::protocol(format!(
            "HTTP {} without error message",
            status.as_u16()
        ))),
    }
}

fn decode_data<T: DeserializeOwned + Default>(data: serde_json::Value) -> Result<T> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data)
        .map_err(|e| PublishError::protocol(format!("unexpected response data: {}", e)))
}

fn decode_list<T: DeserializeOwned>(data: serde_json::Value) -> Result<Vec<T>> {
    if data.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(data)
        .map_err(|e| PublishError::protocol(format!("unexpected list data: {}", e)))
}

/// Paginated view of one collection
pub struct Listing<'a, T> {
    client: &'a ApiClient,
    kind: ResourceKind,
    _item: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T> PageSource<T> for Listing<'_, T>
where
    T: DeserializeOwned + Send,
{
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<T>> {
        self.client.list(self.kind, cursor).await
    }
}

#[async_trait]
impl Authenticator for ApiClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginGrant> {
        let body = LoginRequest {
            username: &credentials.username,
            password: credentials.password.expose_secret(),
        };
        let request = self.http.post(self.endpoint(&["login"])?).json(&body);

        let envelope = self.execute(request).await?;
        let data: LoginData = decode_data(envelope.data).map_err(|e| PublishError::Auth {
            message: e.to_string(),
        })?;

        let token = data
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| PublishError::Auth {
                message: "login reply carried no token".to_string(),
            })?;

        Ok(LoginGrant {
            token: SecretString::from(token),
            expires_at: data.expires_at,
        })
    }
}

#[async_trait]
impl PlatformApi for ApiClient {
    async fn create_container(&self, container: &ContainerSpec) -> Result<ContainerRecord> {
        let token = self.sessions.current_token().await?;
        let request = self
            .authorized(self.http.post(self.endpoint(&["container"])?), &token)
            .json(&NewContainer::from(container));

        decode_data(self.execute(request).await?.data)
    }

    async fn upload_logo(&self, container_id: &str, path: &Path) -> Result<()> {
        let token = self.sessions.current_token().await?;
        let form = multipart::file_form(path).await?;
        self.upload(&token, &["container", container_id, "logo"], form)
            .await
    }

    async fn upload_application(
        &self,
        container_id: &str,
        application: &ApplicationSpec,
        path: &Path,
    ) -> Result<()> {
        let token = self.sessions.current_token().await?;
        let form = multipart::application_form(&application.name, path).await?;
        self.upload(&token, &["container", container_id, "application"], form)
            .await
    }

    async fn create_component(
        &self,
        container_id: &str,
        component: &ComponentSpec,
    ) -> Result<ComponentRecord> {
        let token = self.sessions.current_token().await?;
        let request = self
            .authorized(self.http.post(self.endpoint(&["component"])?), &token)
            .json(&NewComponent::new(container_id, component));

        decode_data(self.execute(request).await?.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn client(sessions: SessionManager) -> ApiClient {
        // Nothing listens on the discard port; reaching the network would
        // surface as a transport error instead of the asserted auth errors.
        ApiClient::new("http://127.0.0.1:9/api", Duration::from_secs(1), Arc::new(sessions))
            .unwrap()
            .with_retry(RetryOptions::single_attempt())
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_segments() {
        let api = client(SessionManager::new(chrono::Duration::hours(1)));

        assert_eq!(
            api.endpoint(&["container", "a b/c", "logo"]).unwrap().as_str(),
            "http://127.0.0.1:9/api/container/a%20b%2Fc/logo"
        );
        assert_eq!(
            api.endpoint(&["component"]).unwrap().as_str(),
            "http://127.0.0.1:9/api/component"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ApiClient::new(
            "not a url",
            Duration::from_secs(1),
            Arc::new(SessionManager::new(chrono::Duration::hours(1))),
        );
        assert!(matches!(result, Err(PublishError::Config { .. })));
    }

    #[test]
    fn test_interpret_success() {
        let envelope = interpret(
            StatusCode::OK,
            r#"{"status": "SUCCEEDED", "data": [1, 2], "totalCount": 2}"#,
        )
        .unwrap();

        assert_eq!(envelope.total_count, Some(2));
        assert_eq!(decode_list::<u32>(envelope.data).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_interpret_error_body_is_verbatim() {
        let error = interpret(
            StatusCode::CONFLICT,
            r#"{"status": "FAILED", "message": "Component 'ndvi' already exists"}"#,
        )
        .unwrap_err();

        match error {
            PublishError::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Component 'ndvi' already exists");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_failed_status_on_2xx() {
        let error = interpret(
            StatusCode::OK,
            r#"{"status": "FAILED", "message": "quota exceeded"}"#,
        )
        .unwrap_err();

        assert!(matches!(error, PublishError::Api { status: 200, ref message } if message == "quota exceeded"));
    }

    #[test]
    fn test_interpret_undecodable_bodies() {
        assert!(matches!(
            interpret(StatusCode::OK, "<html>oops</html>"),
            Err(PublishError::Protocol { .. })
        ));
        assert!(matches!(
            interpret(StatusCode::BAD_GATEWAY, "Bad Gateway"),
            Err(PublishError::Protocol { .. })
        ));
        assert!(matches!(
            interpret(StatusCode::OK, r#"{"data": 1}"#),
            Err(PublishError::Protocol { .. })
        ));
    }

    #[test]
    fn test_decode_data_null_gives_default() {
        let record: ContainerRecord = decode_data(serde_json::Value::Null).unwrap();
        assert!(record.id.is_none());

        let result: Result<ContainerRecord> = decode_data(serde_json::json!("text"));
        assert!(matches!(result, Err(PublishError::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_fail_before_network() {
        let api = client(SessionManager::new(chrono::Duration::hours(1)));
        let cursor = PageCursor::first(NonZeroU32::new(10).unwrap());

        let result = api.list::<ComponentRecord>(ResourceKind::Component, &cursor).await;
        assert!(matches!(result, Err(PublishError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_get_and_delete_require_a_session() {
        let api = client(SessionManager::new(chrono::Duration::hours(1)));

        assert!(matches!(
            api.get::<ContainerRecord>(ResourceKind::Container, "c-1").await,
            Err(PublishError::NotAuthenticated)
        ));
        assert!(matches!(
            api.delete(ResourceKind::Component, "ndvi").await,
            Err(PublishError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_fails_before_network() {
        let sessions = SessionManager::new(chrono::Duration::hours(1));
        sessions
            .restore(
                SecretString::from("stale-token-value"),
                chrono::Utc::now() - chrono::Duration::minutes(1),
            )
            .await;
        let api = client(sessions);

        let spec = ContainerSpec {
            id: None,
            name: "c".to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            tag: "latest".to_string(),
            logo: None,
            applications: Vec::new(),
        };

        assert!(matches!(
            api.create_container(&spec).await,
            Err(PublishError::AuthExpired { .. })
        ));
        assert!(matches!(
            api.list_all::<ContainerRecord>(ResourceKind::Container).await,
            Err(PublishError::AuthExpired { .. })
        ));
    }
}
