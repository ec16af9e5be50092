//! API client for the Appwrite-style REST service.
//!
//! `ServiceClient` covers the account-session endpoints and the document
//! endpoints of one fixed database/collection pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, Response, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::SessionData;
use crate::config::{Config, ENV_PROJECT_ID};
use crate::models::{Identity, StudentFields, StudentRecord};

use super::{ApiError, Query, RosterBackend};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const PROJECT_HEADER: &str = "X-Appwrite-Project";

/// Set by the service when it cannot rely on third-party cookies; carries
/// the session cookies as a JSON object.
const FALLBACK_COOKIES_HEADER: &str = "x-fallback-cookies";

/// Document id placeholder the service replaces with a generated id.
const UNIQUE_ID: &str = "unique()";

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "userId")]
    user_id: String,
    expire: DateTime<Utc>,
    #[serde(default)]
    secret: String,
}

#[derive(Debug, Deserialize)]
struct DocumentList<T> {
    #[serde(default)]
    total: u64,
    documents: Vec<T>,
}

/// Client for the roster service.
/// Clone is cheap and clones share the attached session.
#[derive(Clone)]
pub struct ServiceClient {
    client: Client,
    endpoint: String,
    project_id: String,
    database_id: String,
    collection_id: String,
    session: Arc<RwLock<Option<String>>>,
}

impl ServiceClient {
    /// Create a new client for the configured project
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let project_id = config
            .project_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ApiError::NotConfigured(format!("project id (set {})", ENV_PROJECT_ID)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id,
            database_id: config.database_id.clone(),
            collection_id: config.collection_id.clone(),
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Attach a session secret to subsequent requests
    pub async fn set_session(&self, secret: String) {
        *self.session.write().await = Some(secret);
    }

    pub async fn clear_session(&self) {
        *self.session.write().await = None;
    }

    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    fn session_cookie_name(&self) -> String {
        format!("a_session_{}", self.project_id)
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint, self.database_id, self.collection_id
        )
    }

    /// `endpoint` with `segments` appended, each percent-encoded as a single
    /// path segment.
    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let invalid = || ApiError::NotConfigured(format!("invalid endpoint {:?}", self.endpoint));
        let mut url = Url::parse(&self.endpoint).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn document_url(&self, id: &str) -> Result<Url, ApiError> {
        self.endpoint_url(&[
            "databases",
            &self.database_id,
            "collections",
            &self.collection_id,
            "documents",
            id,
        ])
    }

    /// Find the session secret in a session-creation response: the
    /// `a_session_<project>` cookie, else the fallback-cookies header.
    fn secret_from_headers(&self, headers: &header::HeaderMap) -> Option<String> {
        let name = self.session_cookie_name();

        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            if let Some(secret) = cookie_value(value, &name) {
                return Some(secret);
            }
        }

        headers
            .get(FALLBACK_COOKIES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| serde_json::from_str::<HashMap<String, String>>(raw).ok())
            .and_then(|cookies| cookies.get(&name).cloned())
            .filter(|secret| !secret.is_empty())
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    /// Send a request, attaching project and session, retrying on 429.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let secret = self.session.read().await.clone();
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            debug!(%method, url, authenticated = secret.is_some(), "Sending request");

            let mut request = self
                .client
                .request(method.clone(), url)
                .header(PROJECT_HEADER, self.project_id.as_str());
            if let Some(ref secret) = secret {
                request = request.header(
                    header::COOKIE,
                    format!("{}={}", self.session_cookie_name(), secret),
                );
            }
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}

/// Value of cookie `name` in a `Set-Cookie` header line, if that is the
/// cookie being set.
fn cookie_value(set_cookie: &str, name: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?.trim();
    let (key, value) = pair.split_once('=')?;
    let value = value.trim();
    (key.trim() == name && !value.is_empty()).then(|| value.to_string())
}

#[async_trait]
impl RosterBackend for ServiceClient {
    async fn create_password_session(&self, email: &str, password: &str) -> Result<SessionData, ApiError> {
        // The service refuses to create a session while one is attached.
        self.clear_session().await;

        let url = format!("{}/account/sessions/email", self.endpoint);
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self.execute(Method::POST, &url, &[], Some(&body)).await?;

        let cookie_secret = self.secret_from_headers(response.headers());
        let session: SessionResponse = Self::parse_json(response, "session").await?;

        let secret = if session.secret.is_empty() {
            cookie_secret.ok_or_else(|| {
                ApiError::InvalidResponse("Session created but no session secret returned".to_string())
            })?
        } else {
            session.secret
        };

        self.set_session(secret.clone()).await;
        debug!(session_id = %session.id, user_id = %session.user_id, "Session created");

        Ok(SessionData {
            session_id: session.id,
            user_id: session.user_id,
            secret,
            expire: session.expire,
            created_at: Utc::now(),
        })
    }

    fn delegated_login_url(&self, provider: &str, redirect: &str, scopes: &[String]) -> Result<String, ApiError> {
        if provider.trim().is_empty() {
            return Err(ApiError::NotConfigured("delegated login provider".to_string()));
        }
        Url::parse(redirect)
            .map_err(|e| ApiError::NotConfigured(format!("invalid app url {:?}: {}", redirect, e)))?;

        let mut url = self.endpoint_url(&["account", "sessions", "oauth2", provider])?;
        url.query_pairs_mut()
            .append_pair("project", &self.project_id)
            .append_pair("success", redirect)
            .append_pair("failure", redirect)
            .extend_pairs(scopes.iter().map(|scope| ("scopes[]", scope)));
        Ok(url.into())
    }

    async fn current_identity(&self) -> Result<Identity, ApiError> {
        if !self.has_session().await {
            return Err(ApiError::Unauthorized("No active session".to_string()));
        }
        let url = format!("{}/account", self.endpoint);
        let response = self.execute(Method::GET, &url, &[], None).await?;
        Self::parse_json(response, "account").await
    }

    async fn delete_current_session(&self) -> Result<(), ApiError> {
        let url = format!("{}/account/sessions/current", self.endpoint);
        let result = self.execute(Method::DELETE, &url, &[], None).await.map(|_| ());
        self.clear_session().await;
        result
    }

    async fn list_students(&self, queries: &[Query]) -> Result<Vec<StudentRecord>, ApiError> {
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|q| ("queries[]", q.to_param()))
            .collect();
        let response = self
            .execute(Method::GET, &self.documents_url(), &params, None)
            .await?;
        let list: DocumentList<StudentRecord> = Self::parse_json(response, "document list").await?;
        debug!(total = list.total, returned = list.documents.len(), "Listed students");
        Ok(list.documents)
    }

    async fn create_student(&self, fields: &StudentFields) -> Result<StudentRecord, ApiError> {
        let body = serde_json::json!({ "documentId": UNIQUE_ID, "data": fields });
        let response = self
            .execute(Method::POST, &self.documents_url(), &[], Some(&body))
            .await?;
        Self::parse_json(response, "created document").await
    }

    async fn delete_student(&self, id: &str) -> Result<(), ApiError> {
        let url = self.document_url(id)?;
        self.execute(Method::DELETE, url.as_str(), &[], None).await.map(|_| ())
    }
}
