/*!
Observability infrastructure for Depot.

- Structured logging through `tracing`, initialised once per process
- Prometheus counters and latency histograms for repository operations
  (behind the `metrics` feature)
*/

#[cfg(feature = "metrics")]
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
#[cfg(feature = "metrics")]
use std::time::Instant;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{RepositoryError, Result};

/// Global metrics instance
#[cfg(feature = "metrics")]
static METRICS: OnceLock<RepositoryMetrics> = OnceLock::new();

/// Metrics collection for repository operations
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct RepositoryMetrics {
    pub operations_total: IntCounterVec,
    pub errors_total: IntCounterVec,
    pub latency_seconds: HistogramVec,

    // Prometheus registry for scraping
    registry: Registry,
}

#[cfg(feature = "metrics")]
impl RepositoryMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new("depot_operations_total", "Repository operations started"),
            &["operation"],
        )
        .map_err(|e| metric_error("depot_operations_total", e))?;

        let errors_total = IntCounterVec::new(
            Opts::new("depot_errors_total", "Repository operations that failed"),
            &["operation"],
        )
        .map_err(|e| metric_error("depot_errors_total", e))?;

        let latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "depot_latency_seconds",
                "Duration of repository operations in seconds",
            ),
            &["operation"],
        )
        .map_err(|e| metric_error("depot_latency_seconds", e))?;

        registry
            .register(Box::new(operations_total.clone()))
            .map_err(|e| metric_error("depot_operations_total", e))?;
        registry
            .register(Box::new(errors_total.clone()))
            .map_err(|e| metric_error("depot_errors_total", e))?;
        registry
            .register(Box::new(latency_seconds.clone()))
            .map_err(|e| metric_error("depot_latency_seconds", e))?;

        Ok(Self {
            operations_total,
            errors_total,
            latency_seconds,
            registry,
        })
    }

    /// Get or initialize global metrics instance
    pub fn global() -> &'static RepositoryMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize Depot metrics"))
    }

    pub fn record_operation(&self, operation: &str) {
        self.operations_total.with_label_values(&[operation]).inc();
    }

    pub fn record_error(&self, operation: &str) {
        self.errors_total.with_label_values(&[operation]).inc();
    }

    pub fn record_latency(&self, operation: &str, duration: std::time::Duration) {
        self.latency_seconds
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| RepositoryError::config(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| RepositoryError::config(format!("Failed to convert metrics to string: {e}")))
    }
}

#[cfg(feature = "metrics")]
fn metric_error(name: &str, err: prometheus::Error) -> RepositoryError {
    RepositoryError::config(format!("Failed to set up metric {name}: {err}"))
}

/// Measures one repository operation
#[cfg(feature = "metrics")]
pub struct OperationTimer {
    start: Instant,
    operation: &'static str,
}

#[cfg(feature = "metrics")]
impl OperationTimer {
    /// Count the operation and start timing it
    pub fn start(operation: &'static str) -> Self {
        RepositoryMetrics::global().record_operation(operation);
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Record latency, and an error if the operation failed
    pub fn finish(self, succeeded: bool) {
        let metrics = RepositoryMetrics::global();
        metrics.record_latency(self.operation, self.start.elapsed());
        if !succeeded {
            metrics.record_error(self.operation);
        }
    }
}

/// Install the global tracing subscriber
///
/// The filter comes from `RUST_LOG` when set, otherwise `depot=info`.
/// With `json` the output is one JSON object per event, otherwise the
/// human-readable formatter is used.
pub fn init_observability(json: bool) -> Result<()> {
    init_observability_with_filter(json, None)
}

/// Like [`init_observability`] but with an explicit default filter directive,
/// e.g. `"debug"`. `RUST_LOG` still takes precedence.
pub fn init_observability_with_filter(json: bool, default_directive: Option<&str>) -> Result<()> {
    #[cfg(feature = "metrics")]
    RepositoryMetrics::global();

    let directive = default_directive.unwrap_or("depot=info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .map_err(|e| RepositoryError::config(format!("Invalid log filter {directive:?}: {e}")))?;

    let registry = TracingRegistry::default().with(filter);
    let installed = if json {
        set_global_default(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(false),
            ),
        )
    } else {
        set_global_default(registry.with(tracing_subscriber::fmt::layer().with_target(false)))
    };

    installed.map_err(|e| {
        RepositoryError::config(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::debug!("Depot observability initialized");
    Ok(())
}
