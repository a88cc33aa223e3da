//! Error classification: decides whether a failed dispatch is worth retrying.

use crate::dispatch::{DispatchError, RpcCode};

/// Classification of a dispatch error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// May succeed on retry (timeouts, rate limits, transient 5xx).
    Transient,
    /// Will not succeed on retry (bad input, auth, not found).
    Permanent,
    /// Couldn't be classified with confidence; treated as transient.
    Unknown,
}

const TRANSIENT_SUBSTRINGS: &[&str] = &[
    "timeout",
    "deadline exceeded",
    "connection refused",
    "connection reset",
    "temporary failure",
    "unavailable",
    "rate limit",
    "too many requests",
    "gateway timeout",
    "network unreachable",
];

const PERMANENT_SUBSTRINGS: &[&str] = &[
    "invalid",
    "validation failed",
    "not found",
    "unauthorized",
    "forbidden",
    "bad request",
    "missing",
    "malformed",
];

/// Classify a [`DispatchError`] in priority order: cancellation, deadline,
/// network, structured RPC code, message substrings, default-transient.
pub fn classify_error(error: &DispatchError) -> ErrorClass {
    match error {
        DispatchError::Cancelled(_) => ErrorClass::Permanent,
        DispatchError::DeadlineExceeded(_) => ErrorClass::Transient,
        DispatchError::Network(_) => ErrorClass::Transient,
        DispatchError::Rpc { code, .. } => classify_rpc_code(*code),
        DispatchError::UnknownNodeType(_) => ErrorClass::Permanent,
        DispatchError::Message(msg) => classify_message(msg),
    }
}

fn classify_rpc_code(code: RpcCode) -> ErrorClass {
    match code {
        RpcCode::Unavailable
        | RpcCode::DeadlineExceeded
        | RpcCode::ResourceExhausted
        | RpcCode::Aborted
        | RpcCode::Internal
        | RpcCode::Unknown => ErrorClass::Transient,
        RpcCode::InvalidArgument
        | RpcCode::NotFound
        | RpcCode::AlreadyExists
        | RpcCode::PermissionDenied
        | RpcCode::Unauthenticated
        | RpcCode::FailedPrecondition
        | RpcCode::OutOfRange
        | RpcCode::Unimplemented => ErrorClass::Permanent,
    }
}

fn classify_message(msg: &str) -> ErrorClass {
    let lower = msg.to_lowercase();
    if TRANSIENT_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return ErrorClass::Transient;
    }
    if PERMANENT_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return ErrorClass::Permanent;
    }
    ErrorClass::Transient
}
