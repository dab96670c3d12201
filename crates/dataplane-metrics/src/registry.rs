//! Instance-scoped Prometheus registry and metric constructors.
//!
//! Registers a handful of counters and one histogram, unwrapping at startup
//! since a bad metric name is a programming error, not a runtime condition.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

/// Bucket boundaries, in seconds, shared by every duration histogram this
/// crate registers.
pub const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
}

/// Owns one [`prometheus::Registry`] for the lifetime of a process and
/// provides typed constructors for the metric kinds this crate uses.
pub struct MetricRegistry {
    registry: Registry,
    namespace: String,
}

impl MetricRegistry {
    /// `namespace` prefixes every metric name registered through this
    /// instance, e.g. `ingress_controller` yields `ingress_controller_reconciliation_total`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { registry: Registry::new(), namespace: namespace.into() }
    }

    pub fn inner(&self) -> &Registry {
        &self.registry
    }

    fn name(&self, metric: &str) -> String {
        format!("{}_{}", self.namespace, metric)
    }

    pub fn counter(&self, metric: &str, help: &str) -> Result<IntCounter, MetricsError> {
        let counter = IntCounter::with_opts(Opts::new(self.name(metric), help))?;
        self.registry.register(Box::new(counter.clone()))?;
        Ok(counter)
    }

    pub fn gauge(&self, metric: &str, help: &str) -> Result<IntGauge, MetricsError> {
        let gauge = IntGauge::with_opts(Opts::new(self.name(metric), help))?;
        self.registry.register(Box::new(gauge.clone()))?;
        Ok(gauge)
    }

    pub fn histogram(&self, metric: &str, help: &str, buckets: &[f64]) -> Result<Histogram, MetricsError> {
        let opts = HistogramOpts::new(self.name(metric), help).buckets(buckets.to_vec());
        let histogram = Histogram::with_opts(opts)?;
        self.registry.register(Box::new(histogram.clone()))?;
        Ok(histogram)
    }

    pub fn labeled_counter(&self, metric: &str, help: &str, labels: &[&str]) -> Result<IntCounterVec, MetricsError> {
        let vec = IntCounterVec::new(Opts::new(self.name(metric), help), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    pub fn labeled_gauge(&self, metric: &str, help: &str, labels: &[&str]) -> Result<IntGaugeVec, MetricsError> {
        let vec = IntGaugeVec::new(Opts::new(self.name(metric), help), labels)?;
        self.registry.register(Box::new(vec.clone()))?;
        Ok(vec)
    }
}
