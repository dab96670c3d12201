//! Multi-version HTTP client for the HAProxy Dataplane API.
//!
//! Three HAProxy minor releases (3.0, 3.1, 3.2), each in community and
//! enterprise editions, expose six incompatible HTTP schemas for the same
//! resources. This crate is the in-process façade that probes a remote
//! endpoint, selects the right schema binding, runs configuration changes
//! inside versioned transactions with optimistic-lock retry, and provides
//! typed storage operations for SSL certs, map files, CRT-lists, and
//! general files.
//!
//! Control flow for a write: [`adapter::execute_transaction`] reads the
//! current version ([`config_ops::read_version`]), starts a transaction
//! ([`transaction::Transaction::start`]), runs the caller's block through
//! [`dispatch::Dispatch`] (using [`translate`] to reshape models), and
//! commits or retries on conflict.

pub mod adapter;
pub mod binding;
pub mod clientset;
pub mod config_ops;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod probe;
pub mod storage;
pub mod transaction;
pub mod translate;
pub mod types;

pub use clientset::Clientset;
pub use dispatch::{CrudKind, CrudOp, Dispatch};
pub use error::{Error, ResourceState, VersionConflictError};
pub use transaction::{CommitResult, Transaction};
pub use types::{Capabilities, Endpoint, VersionInfo};
