//! Error types.
//!
//! Every pipeline failure is terminal for the request and is never retried.
//!
//! | Category | Variants | Status |
//! |----------|----------|--------|
//! | **Client input** | `UnsupportedScheme`, `MalformedCredential`, `InvalidVault` | 401 / 403 |
//! | **Upstream auth** | `UpstreamAuth` | forwarded, 500 on transport failure |
//! | **Lookup** | `Lookup` (not found or store failure) | 400 |
//! | **Policy** | `PolicyDenied` | 400 |
//! | **Execution** | `Execution` | 400 |
//!
//! The `Display` output of [`ApiError`] is the message returned to the caller.

use std::time::Duration;

use thiserror::Error;

use crate::job::{JobId, RunId};
use crate::policy::DenyReason;

/// Failures of the request pipeline, one per terminal stage.
#[derive(Debug, Error)]
pub enum ApiError {
    // ── Client input (fix the request) ───────────────────────────────
    /// Credential does not use the bearer scheme.
    #[error("Auth Scheme not supported")]
    UnsupportedScheme,

    /// Credential could not be decoded far enough to extract its claim.
    #[error(transparent)]
    MalformedCredential(#[from] CredentialError),

    /// Vault identifier is not in the configured allow-list.
    #[error("Invalid Vault ID")]
    InvalidVault,

    // ── Upstream auth (status forwarded) ─────────────────────────────
    /// Authorization service rejected the request or could not be reached.
    #[error("{message}")]
    UpstreamAuth { status: u16, message: String },

    // ── Lookup errors ────────────────────────────────────────────────
    /// Job record lookup failed.
    #[error("Failed to check record for id: {id} with error: {source}")]
    Lookup { id: JobId, source: JobStoreError },

    // ── Policy errors ────────────────────────────────────────────────
    /// Job status forbids the requested transition.
    #[error("Job for jobId:{run_id} is {reason}")]
    PolicyDenied { run_id: RunId, reason: DenyReason },

    // ── Execution errors ─────────────────────────────────────────────
    /// Execution backend refused or failed the cancellation.
    #[error("Failed to cancel job for jobId: {run_id} with error: {source}")]
    Execution {
        run_id: RunId,
        source: ExecutionError,
    },
}

impl ApiError {
    /// HTTP status code returned to the caller for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedScheme => 401,
            Self::MalformedCredential(_) | Self::InvalidVault => 403,
            Self::UpstreamAuth { status, .. } => *status,
            Self::Lookup { .. } | Self::PolicyDenied { .. } | Self::Execution { .. } => 400,
        }
    }

    /// Returns `true` if the caller's own input caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedScheme | Self::MalformedCredential(_) | Self::InvalidVault
        )
    }
}

/// Reasons a bearer credential is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Malformed credential: missing token segment")]
    MissingToken,

    #[error("Malformed credential: token is not a three-part structured token")]
    NotStructured,

    #[error("Malformed credential: payload is not valid base64url")]
    InvalidEncoding,

    #[error("Malformed credential: payload is not a JSON object")]
    InvalidPayload,

    #[error("Malformed credential: claim `{0}` is missing or not a string")]
    MissingClaim(&'static str),
}

/// Job record store failures.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// No row matches the job identifier.
    #[error("no job record found")]
    NotFound,

    /// Connectivity or decode failure. `detail` is logged, not returned.
    #[error("job store unavailable")]
    Unavailable { detail: String },

    #[error("job store did not respond within {0:?}")]
    Timeout(Duration),
}

impl JobStoreError {
    /// Full diagnostic text for operator logs.
    pub fn detail(&self) -> String {
        match self {
            Self::Unavailable { detail } => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Execution backend failures.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("execution backend unreachable: {0}")]
    Transport(String),

    #[error("execution backend returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("execution backend did not respond within {0:?}")]
    Timeout(Duration),
}

/// Startup configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Result type for pipeline stages.
pub type ApiResult<T> = Result<T, ApiError>;
