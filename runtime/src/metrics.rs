//! Prometheus metrics for request lifecycles.
//!
//! Every [`RequestLifecycle`](crate::RequestLifecycle) records its activity via the
//! `metrics` facade. Nothing is exported until a recorder is installed, which is
//! the host's decision; [`MetricsExporter`] installs a Prometheus one.
//!
//! # Example
//!
//! ```rust,no_run
//! use observable_rust_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // ... run requests ...
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Counter of started requests.
pub const REQUESTS_STARTED: &str = "lifecycle_requests_started_total";
/// Counter of requests settled with the success status.
pub const REQUESTS_SUCCEEDED: &str = "lifecycle_requests_succeeded_total";
/// Counter of failed requests, labelled by `kind`.
pub const REQUESTS_FAILED: &str = "lifecycle_requests_failed_total";
/// Counter of settlements discarded under [`RacePolicy::LatestStarted`](crate::RacePolicy).
pub const REQUESTS_STALE: &str = "lifecycle_requests_stale_total";
/// Histogram of start-to-settlement time.
pub const REQUEST_DURATION: &str = "lifecycle_request_duration_seconds";

/// Request latency buckets, in seconds.
pub const DEFAULT_DURATION_BUCKETS: &[f64] =
    &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0];

/// Errors from installing the Prometheus recorder.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The duration buckets were rejected (empty)
    #[error("invalid request duration buckets: {0}")]
    Buckets(#[source] BuildError),
    /// The recorder could not be installed
    #[error("failed to install Prometheus recorder: {0}")]
    Install(#[source] BuildError),
}

/// Installs a Prometheus recorder for lifecycle metrics and renders it on demand.
pub struct MetricsExporter {
    duration_buckets: Vec<f64>,
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter using [`DEFAULT_DURATION_BUCKETS`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            duration_buckets: DEFAULT_DURATION_BUCKETS.to_vec(),
            handle: None,
        }
    }

    /// Use custom bucket bounds for [`REQUEST_DURATION`].
    #[must_use]
    pub fn with_duration_buckets(mut self, buckets: impl Into<Vec<f64>>) -> Self {
        self.duration_buckets = buckets.into();
        self
    }

    /// Describe the lifecycle metrics and install the Prometheus recorder.
    ///
    /// Returns `false` when some other recorder was installed first; the
    /// metrics then go there and [`render`](Self::render) returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Buckets`] for empty duration buckets and
    /// [`MetricsError::Install`] if the recorder fails for any other reason.
    pub fn install(&mut self) -> Result<bool, MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION.to_string()),
                &self.duration_buckets,
            )
            .map_err(MetricsError::Buckets)?;

        match builder.install_recorder() {
            Ok(handle) => {
                tracing::info!(
                    buckets = self.duration_buckets.len(),
                    "Prometheus recorder installed"
                );
                self.handle = Some(handle);
                Ok(true)
            }
            Err(BuildError::FailedToSetGlobalRecorder(_)) => {
                tracing::warn!("A metrics recorder is already installed, skipping Prometheus");
                Ok(false)
            }
            Err(e) => Err(MetricsError::Install(e)),
        }
    }

    /// The installed recorder's handle, if this exporter installed one.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl Default for MetricsExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(REQUESTS_STARTED, "Total number of requests started");
    describe_counter!(
        REQUESTS_SUCCEEDED,
        "Total number of requests that settled with the success status"
    );
    describe_counter!(
        REQUESTS_FAILED,
        "Total number of failed requests, labelled by kind (status, transport, aborted)"
    );
    describe_counter!(
        REQUESTS_STALE,
        "Total number of settlements discarded because a newer request had started"
    );
    describe_histogram!(REQUEST_DURATION, "Time from request start to settlement");
}

/// Request lifecycle metrics recorder.
pub struct LifecycleMetrics;

impl LifecycleMetrics {
    /// Record a request start.
    pub fn record_start() {
        counter!(REQUESTS_STARTED).increment(1);
    }

    /// Record a successful settlement.
    pub fn record_success(duration: Duration) {
        counter!(REQUESTS_SUCCEEDED).increment(1);
        histogram!(REQUEST_DURATION).record(duration.as_secs_f64());
    }

    /// Record a failed settlement of the given kind.
    pub fn record_failure(kind: &'static str, duration: Duration) {
        counter!(REQUESTS_FAILED, "kind" => kind).increment(1);
        histogram!(REQUEST_DURATION).record(duration.as_secs_f64());
    }

    /// Record a settlement discarded as stale.
    pub fn record_stale() {
        counter!(REQUESTS_STALE).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_creation() {
        let exporter = MetricsExporter::new();
        assert!(exporter.handle().is_none());
        assert!(exporter.render().is_none());
    }

    #[test]
    fn test_empty_buckets_rejected() {
        let mut exporter = MetricsExporter::new().with_duration_buckets(Vec::new());
        assert!(matches!(exporter.install(), Err(MetricsError::Buckets(_))));
        assert!(exporter.handle().is_none());
    }

    #[test]
    fn test_exporter_render() {
        let mut exporter = MetricsExporter::new();
        let installed = exporter.install().unwrap();
        assert_eq!(installed, exporter.handle().is_some());

        LifecycleMetrics::record_start();
        LifecycleMetrics::record_success(Duration::from_millis(20));
        LifecycleMetrics::record_failure("status", Duration::from_millis(5));

        // handle is None if another test installed the recorder first
        if let Some(rendered) = exporter.render() {
            assert!(rendered.contains(REQUESTS_STARTED));
            assert!(rendered.contains(REQUESTS_SUCCEEDED));
            assert!(rendered.contains(REQUESTS_FAILED));
            assert!(rendered.contains("lifecycle_request_duration_seconds_bucket"));
        }
    }
}
