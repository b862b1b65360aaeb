//! Vault authorization client.
//!
//! Authorization is delegated entirely to the external vault service: the
//! caller's raw credential is forwarded to `GET <base>/v1/vaults/<vault_id>`
//! and only an exact `200` counts as authorized. Nothing is retried.

use std::time::Duration;

use async_trait::async_trait;

/// Default bound on the authorization round trip.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(60);

/// Response header carrying the authorization service's correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Outcome of one authorization round trip. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// HTTP status from the service, or 500 when it could not be reached.
    pub status: u16,
    /// Correlation id from the service's response headers.
    pub request_id: Option<String>,
    /// Raw response body. Empty on transport failure.
    pub body: String,
    /// Transport error text. `None` when a response was received.
    pub error: Option<String>,
}

impl AuthOutcome {
    pub fn response(status: u16, request_id: Option<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            request_id,
            body: body.into(),
            error: None,
        }
    }

    /// Outcome for a request that never produced a response.
    pub fn transport_failure(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "authorization service unreachable".to_string();
        }
        Self {
            status: 500,
            request_id: None,
            body: String::new(),
            error: Some(error),
        }
    }

    /// Only an exact 200 with no transport error authorizes the request.
    pub fn is_authorized(&self) -> bool {
        self.error.is_none() && self.status == 200
    }

    /// Message surfaced to the caller on rejection.
    pub fn message(&self) -> &str {
        self.error.as_deref().unwrap_or(&self.body)
    }
}

/// Decides whether a credential may access a vault.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, credential: &str, vault_id: &str) -> AuthOutcome;
}

/// [`Authorizer`] backed by the vault management HTTP API.
#[derive(Debug, Clone)]
pub struct HttpAuthorizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthorizer {
    /// Builds an authorizer with its own client bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Uses a shared client. The client's own timeout bounds the call.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn vault_url(&self, vault_id: &str) -> String {
        format!("{}/v1/vaults/{}", self.base_url, vault_id)
    }
}

#[async_trait]
impl Authorizer for HttpAuthorizer {
    async fn authorize(&self, credential: &str, vault_id: &str) -> AuthOutcome {
        let response = self
            .client
            .get(self.vault_url(vault_id))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::AUTHORIZATION, credential)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "authorization request failed");
                return AuthOutcome::transport_failure(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, status, "authorization response body unreadable");
                return AuthOutcome::transport_failure(e.to_string());
            }
        };

        if status != 200 {
            tracing::info!(
                status,
                request_id = request_id.as_deref().unwrap_or(""),
                "authorization rejected"
            );
        }

        AuthOutcome::response(status, request_id, body)
    }
}
