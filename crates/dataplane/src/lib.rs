//! Multi-version HAProxy Dataplane API client with retry and metrics
//! facilities, assembled from three independently-publishable crates
//! re-exported under one facade.
//!
//! - [`client`] — the in-process façade: probes a remote endpoint, selects
//!   the correct schema binding among six (three HAProxy minors × two
//!   editions), runs configuration changes inside versioned transactions
//!   with optimistic-lock retry, and exposes typed storage operations for
//!   SSL certificates, map files, CRT-lists, and general files.
//! - [`retry`] — the generic bounded-attempt retry engine [`client`] builds
//!   its version-conflict and connection-transient retry policies on.
//! - [`metrics`] — an instance-scoped metric registry, a single-writer
//!   event adapter, and the Prometheus scrape server a controller exposes
//!   alongside the client.
//!
//! Control flow for a write: [`client::adapter::execute_transaction`] reads
//! the current version, starts a transaction, runs the caller's block
//! through [`client::dispatch::Dispatch`], and commits or retries the whole
//! block on a version conflict. Kubernetes informers, template rendering,
//! CRD reconciliation loops, webhooks, CLI wiring, leader election, and log
//! shippers are external collaborators this crate does not implement; see
//! each module's documentation for the interfaces it exposes to them.

pub use dataplane_client as client;
pub use dataplane_metrics as metrics;
pub use dataplane_retry as retry;

/// Install a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`,
/// falling back to `info` when unset. A convenience for binaries embedding
/// this crate directly; library consumers with their own subscriber setup
/// should skip this and install their own instead.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
