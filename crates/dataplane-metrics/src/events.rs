//! Single-writer event adapter: translates domain events from the external
//! reconciliation/deployment subsystem into metric updates.
//!
//! One task drains a channel and mutates state that nothing else touches,
//! so no lock is needed around the resource-count map.

use std::collections::HashMap;

use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

use crate::registry::{MetricRegistry, MetricsError, DURATION_BUCKETS};

/// Domain event kinds dispatched to the adapter, per the reconciliation
/// subsystem's event stream (an out-of-scope external collaborator).
#[derive(Debug, Clone)]
pub enum Event {
    ReconciliationCompleted { duration_seconds: f64 },
    ReconciliationFailed,
    DeploymentCompleted { attempted: u64, succeeded: u64, failed: u64, duration_seconds: f64 },
    InstanceDeploymentFailed,
    ValidationCompleted,
    ValidationFailed,
    IndexSynchronized { counts: HashMap<String, i64> },
    ResourceIndexUpdated { resource_type: String, created: i64, deleted: i64, is_initial_sync: bool },
}

struct Metrics {
    events_total: prometheus::IntCounter,
    reconciliation_total: prometheus::IntCounter,
    reconciliation_errors_total: prometheus::IntCounter,
    reconciliation_duration_seconds: prometheus::Histogram,
    deployment_total: prometheus::IntCounter,
    deployment_errors_total: prometheus::IntCounter,
    deployment_duration_seconds: prometheus::Histogram,
    validation_total: prometheus::IntCounter,
    validation_errors_total: prometheus::IntCounter,
    resource_count: prometheus::IntGaugeVec,
}

impl Metrics {
    fn register(registry: &MetricRegistry) -> Result<Self, MetricsError> {
        Ok(Self {
            events_total: registry.counter("events_total", "events processed by the metric adapter")?,
            reconciliation_total: registry.counter("reconciliation_total", "reconciliation attempts")?,
            reconciliation_errors_total: registry
                .counter("reconciliation_errors_total", "failed reconciliation attempts")?,
            reconciliation_duration_seconds: registry.histogram(
                "reconciliation_duration_seconds",
                "reconciliation duration",
                DURATION_BUCKETS,
            )?,
            deployment_total: registry.counter("deployment_total", "deployment attempts")?,
            deployment_errors_total: registry.counter("deployment_errors_total", "failed deployment attempts")?,
            deployment_duration_seconds: registry.histogram(
                "deployment_duration_seconds",
                "deployment duration",
                DURATION_BUCKETS,
            )?,
            validation_total: registry.counter("validation_total", "validation attempts")?,
            validation_errors_total: registry.counter("validation_errors_total", "failed validation attempts")?,
            resource_count: registry.labeled_gauge("resource_count", "tracked resources by type", &["type"])?,
        })
    }
}

/// Owns the resource-count tracker and drives metric updates from a channel
/// of domain events. Must be constructed (and its channel subscribed) before
/// the producer side begins sending, per the subscription-before-start rule.
pub struct EventAdapter {
    metrics: Metrics,
    tracker: HashMap<String, i64>,
}

impl EventAdapter {
    pub fn new(registry: &MetricRegistry) -> Result<Self, MetricsError> {
        Ok(Self { metrics: Metrics::register(registry)?, tracker: HashMap::new() })
    }

    /// Drains `events` until the channel closes or `cancel` fires. Shutdown
    /// is driven solely by cancellation; events still queued when it fires
    /// are dropped rather than drained.
    pub async fn run(mut self, mut events: Receiver<Event>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle(event),
                        None => return,
                    }
                }
            }
        }
    }

    fn handle(&mut self, event: Event) {
        self.metrics.events_total.inc();
        match event {
            Event::ReconciliationCompleted { duration_seconds } => {
                self.metrics.reconciliation_duration_seconds.observe(duration_seconds);
                self.metrics.reconciliation_total.inc();
            }
            Event::ReconciliationFailed => {
                self.metrics.reconciliation_total.inc();
                self.metrics.reconciliation_errors_total.inc();
            }
            Event::DeploymentCompleted { succeeded, duration_seconds, .. } => {
                self.metrics.deployment_duration_seconds.observe(duration_seconds);
                self.metrics.deployment_total.inc();
                if succeeded == 0 {
                    self.metrics.deployment_errors_total.inc();
                }
            }
            Event::InstanceDeploymentFailed => {
                self.metrics.deployment_total.inc();
                self.metrics.deployment_errors_total.inc();
            }
            Event::ValidationCompleted => {
                self.metrics.validation_total.inc();
            }
            Event::ValidationFailed => {
                self.metrics.validation_total.inc();
                self.metrics.validation_errors_total.inc();
            }
            Event::IndexSynchronized { counts } => {
                self.tracker = counts;
                for (resource_type, count) in &self.tracker {
                    self.metrics.resource_count.with_label_values(&[resource_type]).set(*count);
                }
            }
            Event::ResourceIndexUpdated { resource_type, created, deleted, is_initial_sync } => {
                if is_initial_sync {
                    return;
                }
                let entry = self.tracker.entry(resource_type.clone()).or_insert(0);
                *entry += created - deleted;
                self.metrics.resource_count.with_label_values(&[&resource_type]).set(*entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricRegistry;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn gauge_value(registry: &MetricRegistry, name: &str, label: &str) -> Option<i64> {
        registry.inner().gather().into_iter().find(|f| f.name() == name).map(|f| {
            f.get_metric()
                .iter()
                .find(|m| m.get_label().iter().any(|l| l.value() == label))
                .map(|m| m.get_gauge().value() as i64)
                .unwrap_or_default()
        })
    }

    fn counter_value(registry: &MetricRegistry, name: &str) -> u64 {
        registry
            .inner()
            .gather()
            .into_iter()
            .find(|f| f.name() == name)
            .map(|f| f.get_metric()[0].get_counter().value() as u64)
            .unwrap_or_default()
    }

    /// Scenario 6 of §8: index-synchronized then two resource-index-updated
    /// events leave the ingress gauge at 8, the services gauge at 5, and
    /// `events_total` at 3.
    #[tokio::test]
    async fn resource_count_tracks_sync_then_updates() {
        let registry = MetricRegistry::new("ingress_controller");
        let adapter = EventAdapter::new(&registry).unwrap();
        let (tx, rx) = mpsc::channel(8);

        let mut counts = HashMap::new();
        counts.insert("ingresses".to_string(), 10);
        counts.insert("services".to_string(), 5);
        tx.send(Event::IndexSynchronized { counts }).await.unwrap();
        tx.send(Event::ResourceIndexUpdated {
            resource_type: "ingresses".into(),
            created: 3,
            deleted: 1,
            is_initial_sync: false,
        })
        .await
        .unwrap();
        tx.send(Event::ResourceIndexUpdated {
            resource_type: "ingresses".into(),
            created: 0,
            deleted: 4,
            is_initial_sync: false,
        })
        .await
        .unwrap();
        drop(tx);
        adapter.run(rx, CancellationToken::new()).await;

        assert_eq!(gauge_value(&registry, "ingress_controller_resource_count", "ingresses"), Some(8));
        assert_eq!(gauge_value(&registry, "ingress_controller_resource_count", "services"), Some(5));
        assert_eq!(counter_value(&registry, "ingress_controller_events_total"), 3);
    }

    #[tokio::test]
    async fn initial_sync_update_is_ignored() {
        let registry = MetricRegistry::new("ingress_controller");
        let adapter = EventAdapter::new(&registry).unwrap();
        let (tx, rx) = mpsc::channel(8);
        tx.send(Event::ResourceIndexUpdated {
            resource_type: "ingresses".into(),
            created: 5,
            deleted: 0,
            is_initial_sync: true,
        })
        .await
        .unwrap();
        drop(tx);
        adapter.run(rx, CancellationToken::new()).await;

        assert_eq!(gauge_value(&registry, "ingress_controller_resource_count", "ingresses"), None);
    }

    #[tokio::test]
    async fn deployment_completed_with_zero_succeeded_counts_as_failure() {
        let registry = MetricRegistry::new("ingress_controller");
        let adapter = EventAdapter::new(&registry).unwrap();
        let (tx, rx) = mpsc::channel(8);
        tx.send(Event::DeploymentCompleted { attempted: 2, succeeded: 0, failed: 2, duration_seconds: 1.0 })
            .await
            .unwrap();
        drop(tx);
        adapter.run(rx, CancellationToken::new()).await;

        assert_eq!(counter_value(&registry, "ingress_controller_deployment_total"), 1);
        assert_eq!(counter_value(&registry, "ingress_controller_deployment_errors_total"), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_without_draining_remaining_events() {
        let registry = MetricRegistry::new("ingress_controller");
        let adapter = EventAdapter::new(&registry).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        tx.send(Event::ValidationCompleted).await.unwrap();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), adapter.run(rx, cancel)).await.unwrap();
        assert!(tx.send(Event::ValidationCompleted).await.is_ok());
    }
}
