//! Instance-scoped observability facility: a Prometheus metric registry,
//! a single-writer event adapter that updates metrics from a domain event
//! stream, and an HTTP scrape endpoint.
//!
//! Every [`MetricRegistry`] is created fresh for one iteration of the
//! controller's running configuration; metric objects are never shared
//! across registries and the process-wide default registry is never used.

pub mod events;
pub mod registry;
pub mod server;

pub use events::{Event, EventAdapter};
pub use registry::{MetricRegistry, MetricsError, DURATION_BUCKETS};
pub use server::{serve, ServeError};
