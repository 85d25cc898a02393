//! Observer hooks fired for every bridge-dispatched operation.
//!
//! Defines [`Observer`] for reacting to engine activity, plus the stock
//! implementations: [`NoopObserver`] (default), [`TracingObserver`]
//! (structured log events), [`MetricsObserver`] (`metrics` counters and
//! histograms) and [`CompositeObserver`], which fans out to several.

use std::sync::Arc;
use std::time::Duration;

use mockgrid_core::EngineError;

/// Sink for per-operation notifications.
///
/// Used as `Arc<dyn Observer>`. Every method receives the wall time the
/// operation took. Implementations must not block.
pub trait Observer: Send + Sync {
    /// Called after a successful single-item read.
    fn on_read(&self, resource: &str, id: &str, elapsed: Duration);

    /// Called after an item is created.
    fn on_create(&self, resource: &str, id: &str, elapsed: Duration);

    /// Called after an item is replaced or patched.
    fn on_update(&self, resource: &str, id: &str, elapsed: Duration);

    /// Called after an item is deleted.
    fn on_delete(&self, resource: &str, id: &str, elapsed: Duration);

    /// Called after a list query. `count` is the page size returned.
    fn on_list(&self, resource: &str, count: usize, elapsed: Duration);

    /// Called after a custom operation completes successfully.
    fn on_custom(&self, operation: &str, elapsed: Duration);

    /// Called when any operation fails. `target` is the resource or
    /// operation name, `action` the requested action.
    fn on_error(&self, target: &str, action: &str, error: &EngineError, elapsed: Duration);
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_read(&self, _: &str, _: &str, _: Duration) {}
    fn on_create(&self, _: &str, _: &str, _: Duration) {}
    fn on_update(&self, _: &str, _: &str, _: Duration) {}
    fn on_delete(&self, _: &str, _: &str, _: Duration) {}
    fn on_list(&self, _: &str, _: usize, _: Duration) {}
    fn on_custom(&self, _: &str, _: Duration) {}
    fn on_error(&self, _: &str, _: &str, _: &EngineError, _: Duration) {}
}

/// Returns a shared [`NoopObserver`].
#[must_use]
pub fn noop_observer() -> Arc<dyn Observer> {
    Arc::new(NoopObserver)
}

/// Emits one structured `tracing` event per notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

#[allow(clippy::cast_possible_truncation)]
fn micros(elapsed: Duration) -> u64 {
    elapsed.as_micros() as u64
}

impl Observer for TracingObserver {
    fn on_read(&self, resource: &str, id: &str, elapsed: Duration) {
        tracing::debug!(resource, id, elapsed_us = micros(elapsed), "read");
    }

    fn on_create(&self, resource: &str, id: &str, elapsed: Duration) {
        tracing::info!(resource, id, elapsed_us = micros(elapsed), "created");
    }

    fn on_update(&self, resource: &str, id: &str, elapsed: Duration) {
        tracing::info!(resource, id, elapsed_us = micros(elapsed), "updated");
    }

    fn on_delete(&self, resource: &str, id: &str, elapsed: Duration) {
        tracing::info!(resource, id, elapsed_us = micros(elapsed), "deleted");
    }

    fn on_list(&self, resource: &str, count: usize, elapsed: Duration) {
        tracing::debug!(resource, count, elapsed_us = micros(elapsed), "listed");
    }

    fn on_custom(&self, operation: &str, elapsed: Duration) {
        tracing::info!(operation, elapsed_us = micros(elapsed), "custom operation completed");
    }

    fn on_error(&self, target: &str, action: &str, error: &EngineError, elapsed: Duration) {
        tracing::warn!(
            target_name = target,
            action,
            code = error.code(),
            error = %error,
            elapsed_us = micros(elapsed),
            "operation failed"
        );
    }
}

/// Records counters and latency histograms through the `metrics` facade.
///
/// Metric names:
/// - `mockgrid_operations_total{resource, action}`
/// - `mockgrid_operation_duration_seconds{resource, action}`
/// - `mockgrid_errors_total{resource, action, code}`
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl MetricsObserver {
    /// Registers help text for the emitted metrics with the installed recorder.
    pub fn describe() {
        metrics::describe_counter!(
            "mockgrid_operations_total",
            "Resource and custom operations handled by the bridge"
        );
        metrics::describe_histogram!(
            "mockgrid_operation_duration_seconds",
            metrics::Unit::Seconds,
            "Bridge operation latency"
        );
        metrics::describe_counter!("mockgrid_errors_total", "Failed bridge operations");
    }

    fn record(target: &str, action: &'static str, elapsed: Duration) {
        metrics::counter!(
            "mockgrid_operations_total",
            "resource" => target.to_string(),
            "action" => action
        )
        .increment(1);
        metrics::histogram!(
            "mockgrid_operation_duration_seconds",
            "resource" => target.to_string(),
            "action" => action
        )
        .record(elapsed.as_secs_f64());
    }
}

impl Observer for MetricsObserver {
    fn on_read(&self, resource: &str, _: &str, elapsed: Duration) {
        Self::record(resource, "get", elapsed);
    }

    fn on_create(&self, resource: &str, _: &str, elapsed: Duration) {
        Self::record(resource, "create", elapsed);
    }

    fn on_update(&self, resource: &str, _: &str, elapsed: Duration) {
        Self::record(resource, "update", elapsed);
    }

    fn on_delete(&self, resource: &str, _: &str, elapsed: Duration) {
        Self::record(resource, "delete", elapsed);
    }

    fn on_list(&self, resource: &str, _: usize, elapsed: Duration) {
        Self::record(resource, "list", elapsed);
    }

    fn on_custom(&self, operation: &str, elapsed: Duration) {
        Self::record(operation, "custom", elapsed);
    }

    fn on_error(&self, target: &str, action: &str, error: &EngineError, _: Duration) {
        metrics::counter!(
            "mockgrid_errors_total",
            "resource" => target.to_string(),
            "action" => action.to_string(),
            "code" => error.code()
        )
        .increment(1);
    }
}

/// Composite observer that fans out to multiple observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn Observer>>,
}

impl CompositeObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observer>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Observer for CompositeObserver {
    fn on_read(&self, resource: &str, id: &str, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_read(resource, id, elapsed);
        }
    }

    fn on_create(&self, resource: &str, id: &str, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_create(resource, id, elapsed);
        }
    }

    fn on_update(&self, resource: &str, id: &str, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_update(resource, id, elapsed);
        }
    }

    fn on_delete(&self, resource: &str, id: &str, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_delete(resource, id, elapsed);
        }
    }

    fn on_list(&self, resource: &str, count: usize, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_list(resource, count, elapsed);
        }
    }

    fn on_custom(&self, operation: &str, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_custom(operation, elapsed);
        }
    }

    fn on_error(&self, target: &str, action: &str, error: &EngineError, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_error(target, action, error, elapsed);
        }
    }
}
