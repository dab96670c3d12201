//! The client's stable, pattern-matchable error surface.
//!
//! Every fallible operation returns [`Error`]. Variants are kept as a flat
//! enum (rather than nested per-component errors) so a caller — or
//! [`dataplane_retry`]'s predicates — can `matches!` on a specific kind
//! without peeling layers of wrapping first.

use dataplane_retry::RetryClassify;

/// Version conflict reported by the server on transaction start or commit.
/// HTTP 406 and 409 are treated identically; both surface this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("version conflict: expected {expected}, server reports {actual}")]
pub struct VersionConflictError {
    pub expected: u64,
    pub actual: String,
}

impl VersionConflictError {
    /// Sentinel used when the server's conflict response carries no
    /// `Configuration-Version` header.
    pub const UNKNOWN_VERSION: &'static str = "unknown";
}

/// Distinguishes "already exists" from "not found" for storage and
/// transaction resource-state errors (§7 kind 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    AlreadyExists,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing URL/username/password at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport failure, non-200 info response, empty version, or an
    /// unsupported major version during the endpoint probe.
    #[error("probe failed: {0}")]
    Probe(String),

    /// No callback was supplied for the branch the dispatcher selected.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// A capability gate refused the call (e.g. CRT-list on 3.0/3.1).
    #[error("capability error: {0}")]
    Capability(String),

    /// An enterprise-only call was issued against a community server.
    #[error("enterprise edition required for this operation")]
    EnterpriseRequired,

    /// Server reported a 409/406 version conflict.
    #[error(transparent)]
    VersionConflict(#[from] VersionConflictError),

    /// Network-layer failure with no response in hand (connection refused,
    /// reset, DNS failure, dial error, or an opaque message containing one
    /// of those substrings).
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response wrapped with an operation description and the
    /// response body, for statuses not given dedicated handling above.
    #[error("http error during {operation}: status {status}, body: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    /// `create` returned 409 (resource already exists) or `update`/`delete`
    /// returned 404 (resource not found), carrying the resource kind and
    /// name so callers can treat this declaratively.
    #[error("{state:?} for {kind} {name}")]
    ResourceState {
        state: ResourceState,
        kind: String,
        name: String,
    },

    /// Commit was attempted on an already-aborted transaction.
    #[error("transaction state error: {0}")]
    TransactionState(String),

    /// The operation's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A version-adapter retry loop exhausted its attempt budget; wraps the
    /// last conflict observed.
    #[error("retries exhausted: {0}")]
    RetriesExhausted(Box<Error>),
}

const TRANSIENT_SUBSTRINGS: [&str; 5] = [
    "connection refused",
    "connection reset",
    "dns",
    "dial",
    "name resolution",
];

impl RetryClassify for Error {
    fn is_version_conflict(&self) -> bool {
        matches!(self, Error::VersionConflict(_))
    }

    fn is_connection_transient(&self) -> bool {
        match self {
            Error::Transport(msg) => {
                let lower = msg.to_lowercase();
                TRANSIENT_SUBSTRINGS.iter().any(|needle| lower.contains(needle))
            }
            _ => false,
        }
    }
}

impl Error {
    /// Build a [`Error::Transport`] from a `reqwest::Error` that has no
    /// response attached (i.e. it never reached the server).
    pub fn from_reqwest_transport(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
