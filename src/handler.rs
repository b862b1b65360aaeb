//! Request handler.
//!
//! Runs one GET or DELETE on a job through a fixed pipeline. Each stage can
//! end the request:
//!
//! ```text
//!   scheme ──→ claim ──→ vault id ──→ authorize ──→ lookup ──→ dispatch
//!    401        403        403        upstream       400      GET:    200
//!                                     status / 500            DELETE: policy ──→ cancel ──→ 200
//!                                                                      400        400
//! ```
//!
//! No state is kept between requests. Collaborators are shared handles
//! built once at startup and passed in through [`RequestHandler::new`].

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use crate::authz::Authorizer;
use crate::backend::ExecutionBackend;
use crate::credential;
use crate::error::{ApiError, ApiResult};
use crate::job::{JobId, JobRecord};
use crate::policy::{self, Decision, Effect, Operation};
use crate::store::JobStore;
use crate::vault::VaultAllowList;

/// One inbound request, already split out of its transport.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub method: String,
    pub job_id: JobId,
    pub vault_id: String,
    /// Raw `Authorization` header.
    pub authorization: Option<String>,
    /// Raw `X-Forwarded-For` header. Informational only.
    pub forwarded_for: Option<String>,
}

impl JobRequest {
    /// First address in `X-Forwarded-For`, the original client.
    pub fn client_ip(&self) -> Option<&str> {
        self.forwarded_for
            .as_deref()
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    }
}

/// Status code and JSON body. The body is empty for pass-through methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct FailureBody<'a> {
    pub id: &'a str,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBody {
    pub id: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<String>,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl SuccessBody {
    fn status(record: &JobRecord) -> Self {
        Self {
            id: record.id.to_string(),
            job_id: record.run_id.to_string(),
            job_status: Some(record.status.to_string()),
            request_id: record.request_id.clone(),
            message: None,
        }
    }

    fn deleted(record: &JobRecord) -> Self {
        Self {
            id: record.id.to_string(),
            job_id: record.run_id.to_string(),
            job_status: None,
            request_id: record.request_id.clone(),
            message: Some("Successfully deleted"),
        }
    }
}

pub struct RequestHandler {
    vault_ids: VaultAllowList,
    authorizer: Arc<dyn Authorizer>,
    store: Arc<dyn JobStore>,
    backend: Arc<dyn ExecutionBackend>,
}

impl RequestHandler {
    pub fn new(
        vault_ids: VaultAllowList,
        authorizer: Arc<dyn Authorizer>,
        store: Arc<dyn JobStore>,
        backend: Arc<dyn ExecutionBackend>,
    ) -> Self {
        Self {
            vault_ids,
            authorizer,
            store,
            backend,
        }
    }

    /// Runs the pipeline and renders the response. Never fails.
    pub async fn handle(&self, request: JobRequest) -> JobResponse {
        let span = tracing::info_span!(
            "job_request",
            job_id = %request.job_id,
            vault_id = %request.vault_id,
            method = %request.method,
            claim = tracing::field::Empty,
        );

        async {
            tracing::info!(client_ip = request.client_ip().unwrap_or("-"), "initiated");

            match self.run(&request).await {
                Ok(Some(body)) => render(200, &body),
                Ok(None) => JobResponse {
                    status: 200,
                    body: String::new(),
                },
                Err(e) => {
                    let status = e.status_code();
                    match &e {
                        ApiError::Lookup { source, .. } => {
                            tracing::error!(status, detail = %source.detail(), "job lookup failed");
                        }
                        e if e.is_client_error() => tracing::info!(status, error = %e, "rejected"),
                        e => tracing::warn!(status, error = %e, "failed"),
                    }
                    render(
                        status,
                        &FailureBody {
                            id: request.job_id.as_str(),
                            message: e.to_string(),
                        },
                    )
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &JobRequest) -> ApiResult<Option<SuccessBody>> {
        let token = request.authorization.as_deref().unwrap_or_default();

        if !credential::validate_scheme(token) {
            return Err(ApiError::UnsupportedScheme);
        }

        let claim = credential::extract_claim(token)?;
        tracing::Span::current().record("claim", claim.as_str());

        if !self.vault_ids.validate(&request.vault_id) {
            return Err(ApiError::InvalidVault);
        }

        let outcome = self.authorizer.authorize(token, &request.vault_id).await;
        if !outcome.is_authorized() {
            return Err(ApiError::UpstreamAuth {
                status: outcome.status,
                message: outcome.message().to_string(),
            });
        }
        tracing::info!(
            auth_request_id = outcome.request_id.as_deref().unwrap_or(""),
            "authorized"
        );

        let record = self
            .store
            .get(&request.job_id)
            .await
            .map_err(|source| ApiError::Lookup {
                id: request.job_id.clone(),
                source,
            })?;

        if let Some(stored) = record.caller_claim.as_deref() {
            if stored != claim {
                tracing::warn!(stored_claim = stored, "credential differs from submitter");
            }
        }

        let operation = Operation::from(request.method.as_str());
        match (policy::decide(&record.status, &operation), operation) {
            (Decision::Deny(reason), _) => Err(ApiError::PolicyDenied {
                run_id: record.run_id,
                reason,
            }),
            (Decision::Allow(Effect::IssueCancellation), _) => {
                tracing::info!(run_id = %record.run_id, backend = self.backend.name(), "cancelling job");
                self.backend
                    .cancel(&record.run_id)
                    .await
                    .map_err(|source| ApiError::Execution {
                        run_id: record.run_id.clone(),
                        source,
                    })?;
                tracing::info!(run_id = %record.run_id, "cancellation requested");
                Ok(Some(SuccessBody::deleted(&record)))
            }
            (Decision::Allow(Effect::None), Operation::Get) => Ok(Some(SuccessBody::status(&record))),
            (Decision::Allow(Effect::None), _) => Ok(None),
        }
    }
}

fn render(status: u16, body: &impl Serialize) -> JobResponse {
    match serde_json::to_string(body) {
        Ok(body) => JobResponse { status, body },
        Err(e) => {
            tracing::error!(error = %e, "response serialization failed");
            JobResponse {
                status: 500,
                body: String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::authz::AuthOutcome;
    use crate::credential::tests::bearer;
    use crate::error::{ExecutionError, JobStoreError};
    use crate::job::{JobStatus, RunId};
    use crate::store::MemoryJobStore;

    struct FixedAuthorizer {
        outcome: AuthOutcome,
        calls: AtomicUsize,
    }

    impl FixedAuthorizer {
        fn new(outcome: AuthOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Authorizer for FixedAuthorizer {
        async fn authorize(&self, _credential: &str, _vault_id: &str) -> AuthOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[derive(Default)]
    struct RecordingBackend {
        cancelled: Mutex<Vec<RunId>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl ExecutionBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn cancel(&self, run_id: &RunId) -> Result<(), ExecutionError> {
            self.cancelled.lock().unwrap().push(run_id.clone());
            match &self.fail_with {
                Some(msg) => Err(ExecutionError::Transport(msg.clone())),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct CountingStore {
        inner: MemoryJobStore,
        lookups: AtomicUsize,
    }

    impl CountingStore {
        fn insert(&self, record: JobRecord) {
            self.inner.insert(record);
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobStore for CountingStore {
        async fn get(&self, id: &JobId) -> Result<JobRecord, JobStoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get(id).await
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl JobStore for BrokenStore {
        async fn get(&self, _id: &JobId) -> Result<JobRecord, JobStoreError> {
            Err(JobStoreError::Unavailable {
                detail: "connection refused".into(),
            })
        }
    }

    struct Fixture {
        handler: RequestHandler,
        authorizer: Arc<FixedAuthorizer>,
        store: Arc<CountingStore>,
        backend: Arc<RecordingBackend>,
    }

    fn fixture_with(outcome: AuthOutcome, backend: RecordingBackend) -> Fixture {
        let authorizer = FixedAuthorizer::new(outcome);
        let store = Arc::new(CountingStore::default());
        let backend = Arc::new(backend);
        let handler = RequestHandler::new(
            VaultAllowList::new(["v1", "v2"]),
            authorizer.clone(),
            store.clone(),
            backend.clone(),
        );
        Fixture {
            handler,
            authorizer,
            store,
            backend,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            AuthOutcome::response(200, Some("auth-1".into()), "{}"),
            RecordingBackend::default(),
        )
    }

    fn record(status: JobStatus) -> JobRecord {
        JobRecord {
            id: "j1".into(),
            run_id: RunId::new("run-1"),
            status,
            request_id: "req-1".into(),
            query: "SELECT * FROM t".into(),
            destination: "s3://out/j1".into(),
            caller_claim: None,
        }
    }

    fn request(method: &str, credential: &str, vault: &str) -> JobRequest {
        JobRequest {
            method: method.into(),
            job_id: "j1".into(),
            vault_id: vault.into(),
            authorization: Some(credential.into()),
            forwarded_for: Some("203.0.113.7, 10.0.0.1".into()),
        }
    }

    fn token() -> String {
        bearer(json!({"jti": "tok-1"}))
    }

    fn body(response: &JobResponse) -> serde_json::Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_401() {
        let f = fixture();
        let response = f.handler.handle(request("GET", "Basic xyz", "v1")).await;

        assert_eq!(response.status, 401);
        assert_eq!(
            response.body,
            r#"{"id":"j1","message":"Auth Scheme not supported"}"#
        );
        assert_eq!(f.authorizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_is_401() {
        let f = fixture();
        let mut req = request("GET", "", "v1");
        req.authorization = None;
        let response = f.handler.handle(req).await;
        assert_eq!(response.status, 401);
    }

    #[tokio::test]
    async fn test_malformed_credential_is_403() {
        let f = fixture();
        let response = f.handler.handle(request("GET", "Bearer opaque", "v1")).await;

        assert_eq!(response.status, 403);
        assert!(
            body(&response)["message"]
                .as_str()
                .unwrap()
                .starts_with("Malformed credential")
        );
        assert_eq!(f.authorizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_unknown_vault_is_403_without_authorization_call() {
        let f = fixture();
        let response = f.handler.handle(request("GET", &token(), "v-unknown")).await;

        assert_eq!(response.status, 403);
        assert_eq!(body(&response)["message"], "Invalid Vault ID");
        assert_eq!(f.authorizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_authorization_rejection_is_forwarded() {
        let f = fixture_with(
            AuthOutcome::response(403, None, "forbidden"),
            RecordingBackend::default(),
        );
        f.store.insert(record(JobStatus::Running));

        let response = f.handler.handle(request("DELETE", &token(), "v1")).await;
        assert_eq!(response.status, 403);
        assert_eq!(body(&response), json!({"id": "j1", "message": "forbidden"}));
        assert_eq!(f.authorizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.store.lookups(), 0);
        assert!(f.backend.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authorization_transport_failure_is_500() {
        let f = fixture_with(
            AuthOutcome::transport_failure("connection reset"),
            RecordingBackend::default(),
        );
        let response = f.handler.handle(request("GET", &token(), "v1")).await;
        assert_eq!(response.status, 500);
        assert_eq!(body(&response)["message"], "connection reset");
        assert_eq!(f.store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_missing_record_is_400() {
        let f = fixture();
        let response = f.handler.handle(request("GET", &token(), "v1")).await;

        assert_eq!(response.status, 400);
        assert_eq!(
            body(&response)["message"],
            "Failed to check record for id: j1 with error: no job record found"
        );
        assert_eq!(f.store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_record_never_cancels() {
        let f = fixture();
        let response = f.handler.handle(request("DELETE", &token(), "v1")).await;

        assert_eq!(response.status, 400);
        assert_eq!(
            body(&response)["message"],
            "Failed to check record for id: j1 with error: no job record found"
        );
        assert_eq!(f.store.lookups(), 1);
        assert!(f.backend.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_400_without_detail() {
        let handler = RequestHandler::new(
            VaultAllowList::new(["v1"]),
            FixedAuthorizer::new(AuthOutcome::response(200, None, "")),
            Arc::new(BrokenStore),
            Arc::new(RecordingBackend::default()),
        );
        let response = handler.handle(request("GET", &token(), "v1")).await;

        assert_eq!(response.status, 400);
        let message = body(&response)["message"].as_str().unwrap().to_string();
        assert!(message.contains("j1"));
        assert!(!message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_get_returns_status() {
        let f = fixture();
        f.store.insert(record(JobStatus::Success));

        let response = f.handler.handle(request("GET", &token(), "v1")).await;
        assert_eq!(response.status, 200);
        assert_eq!(
            body(&response),
            json!({"id": "j1", "jobId": "run-1", "jobStatus": "SUCCESS", "requestId": "req-1"})
        );
        assert!(f.backend.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let f = fixture();
        f.store.insert(record(JobStatus::Running));

        let first = f.handler.handle(request("GET", &token(), "v1")).await;
        let second = f.handler.handle(request("GET", &token(), "v1")).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_delete_running_cancels_once() {
        let f = fixture();
        f.store.insert(record(JobStatus::Running));

        let response = f.handler.handle(request("DELETE", &token(), "v1")).await;
        assert_eq!(response.status, 200);
        assert_eq!(
            body(&response),
            json!({"id": "j1", "jobId": "run-1", "requestId": "req-1", "message": "Successfully deleted"})
        );
        assert_eq!(
            f.backend.cancelled.lock().unwrap().as_slice(),
            &[RunId::new("run-1")]
        );
    }

    #[tokio::test]
    async fn test_delete_pending_cancels() {
        let f = fixture();
        f.store.insert(record(JobStatus::Pending));

        let response = f.handler.handle(request("DELETE", &token(), "v1")).await;
        assert_eq!(response.status, 200);
        assert_eq!(f.backend.cancelled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_finished_jobs_is_denied() {
        let cases = [
            (JobStatus::Success, "Job for jobId:run-1 is already completed"),
            (JobStatus::Failure, "Job for jobId:run-1 is already completed"),
            (JobStatus::Cancelling, "Job for jobId:run-1 is already cancelled"),
            (JobStatus::Cancelled, "Job for jobId:run-1 is already cancelled"),
        ];
        for (status, message) in cases {
            let f = fixture();
            f.store.insert(record(status));

            let response = f.handler.handle(request("DELETE", &token(), "v1")).await;
            assert_eq!(response.status, 400);
            assert_eq!(body(&response)["message"], message);
            assert!(f.backend.cancelled.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_cancel_failure_is_400() {
        let f = fixture_with(
            AuthOutcome::response(200, None, ""),
            RecordingBackend {
                fail_with: Some("throttled".into()),
                ..Default::default()
            },
        );
        f.store.insert(record(JobStatus::Running));

        let response = f.handler.handle(request("DELETE", &token(), "v1")).await;
        assert_eq!(response.status, 400);
        assert_eq!(
            body(&response)["message"],
            "Failed to cancel job for jobId: run-1 with error: execution backend unreachable: throttled"
        );
    }

    #[tokio::test]
    async fn test_other_methods_pass_through_empty() {
        let f = fixture();
        f.store.insert(record(JobStatus::Running));

        let response = f.handler.handle(request("PATCH", &token(), "v1")).await;
        assert_eq!(
            response,
            JobResponse {
                status: 200,
                body: String::new()
            }
        );
        assert!(f.backend.cancelled.lock().unwrap().is_empty());
    }

    #[test]
    fn test_client_ip_is_first_forwarded_entry() {
        let req = request("GET", "", "v1");
        assert_eq!(req.client_ip(), Some("203.0.113.7"));

        let req = JobRequest {
            forwarded_for: None,
            ..req
        };
        assert_eq!(req.client_ip(), None);
    }
}
