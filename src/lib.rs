//! Vault Jobs: status and cancellation API for asynchronous query jobs
//!
//! This crate serves `GET` and `DELETE` on a job behind an external
//! vault-style authorization service. It reads job records, decides whether
//! the requested transition is allowed, and asks the execution backend to
//! cancel a run when it is. It never writes a job status itself.
//!
//! # Overview
//!
//! - [`credential`] checks the bearer scheme and decodes a correlation claim
//! - [`VaultAllowList`] gates the vault identifier
//! - [`Authorizer`] delegates authorization to the vault service
//! - [`JobStore`] looks up the [`JobRecord`]
//! - [`policy::decide`] maps `(JobStatus, Operation)` to allow or deny
//! - [`ExecutionBackend`] issues the cancellation
//! - [`RequestHandler`] runs all of the above in order
//!
//! # Pipeline
//!
//! ```text
//!   scheme ──→ claim ──→ vault id ──→ authorize ──→ lookup ──→ policy ──→ cancel
//!   (pure)     (pure)     (pure)       (HTTP)       (SQL)      (pure)     (HTTP)
//! ```
//!
//! Every stage may end the request with a failure response. Nothing is
//! retried.

pub mod authz;
pub mod backend;
pub mod config;
pub mod credential;
pub mod error;
pub mod handler;
pub mod job;
pub mod policy;
pub mod server;
pub mod store;
pub mod vault;

pub use authz::{AuthOutcome, Authorizer, HttpAuthorizer};
pub use backend::{ExecutionBackend, HttpExecutionBackend};
pub use config::{Config, DatabaseConfig};
pub use error::{ApiError, ApiResult, ConfigError, CredentialError, ExecutionError, JobStoreError};
pub use handler::{JobRequest, JobResponse, RequestHandler};
pub use job::{JobId, JobRecord, JobStatus, RunId};
pub use policy::{Decision, DenyReason, Effect, Operation};
pub use store::{JobStore, MemoryJobStore, PgJobStore};
pub use vault::VaultAllowList;
