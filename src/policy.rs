//! Job state policy.
//!
//! A pure decision over `(status, operation)`:
//!
//! | Operation | Status | Decision |
//! |-----------|--------|----------|
//! | `GET` | any | allow, no effect |
//! | `DELETE` | `SUCCESS`, `FAILURE` | deny: already completed |
//! | `DELETE` | `CANCELLING`, `CANCELLED` | deny: already cancelled |
//! | `DELETE` | anything else, unrecognized tokens included | allow, issue cancellation |
//! | other | any | allow, no effect |

use crate::job::JobStatus;

/// Operation requested on a job, derived from the HTTP method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Get,
    Delete,
    /// Any other method. Passed through without effect.
    Other(String),
}

impl From<&str> for Operation {
    fn from(method: &str) -> Self {
        match method {
            "GET" => Operation::Get,
            "DELETE" => Operation::Delete,
            other => Operation::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Get => f.write_str("GET"),
            Operation::Delete => f.write_str("DELETE"),
            Operation::Other(method) => f.write_str(method),
        }
    }
}

/// Side effect to apply once an operation is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    IssueCancellation,
}

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    AlreadyCompleted,
    AlreadyCancelled,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::AlreadyCompleted => f.write_str("already completed"),
            DenyReason::AlreadyCancelled => f.write_str("already cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Effect),
    Deny(DenyReason),
}

/// Decides whether `operation` may proceed on a job in `status`.
pub fn decide(status: &JobStatus, operation: &Operation) -> Decision {
    match operation {
        Operation::Get | Operation::Other(_) => Decision::Allow(Effect::None),
        Operation::Delete if status.is_completed() => Decision::Deny(DenyReason::AlreadyCompleted),
        Operation::Delete if status.is_cancel_requested() => {
            Decision::Deny(DenyReason::AlreadyCancelled)
        }
        Operation::Delete => Decision::Allow(Effect::IssueCancellation),
    }
}
