//! Prometheus-backed metrics and HTTP exporter for the consensus core.
//!
//! Mirrors the structure of a typical `metrics::prometheus` module in this
//! lineage: a [`ConductorMetrics`] struct of strongly-typed metric handles
//! registered into a [`Registry`], wrapped in a [`MetricsRegistry`] that
//! also exposes an async `/metrics` exporter over `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Metrics emitted by the epoch orchestrator, the agreement stack, and the
/// detection/retry layers (SPEC_FULL.md §B).
#[derive(Clone)]
pub struct ConductorMetrics {
    /// Wall-clock duration of a full epoch, from `AWAIT_BATCHES` to `DONE`.
    pub epoch_duration_seconds: Histogram,
    /// Duration of a single VDF `compute` call, in seconds.
    pub vdf_compute_seconds: Histogram,
    /// Total RBC instances that reached `Deliver`.
    pub rbc_deliveries_total: IntCounter,
    /// Number of rounds a BBA instance took before deciding.
    pub bba_rounds_to_decide: Histogram,
    /// Evidence records emitted, labeled by kind.
    pub evidence_total: IntCounterVec,
    /// Circuit breaker state per peer: 0 = closed, 1 = open, 2 = half-open.
    pub circuit_breaker_state: prometheus::GaugeVec,
    /// Current number of entries in the seen-message cache.
    pub seen_cache_size: IntGauge,
}

impl ConductorMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let epoch_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "conductor_epoch_duration_seconds",
                "Time for one epoch to go from AWAIT_BATCHES to DONE",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 90.0, 120.0, 180.0]),
        )?;
        registry.register(Box::new(epoch_duration_seconds.clone()))?;

        let vdf_compute_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "conductor_vdf_compute_seconds",
                "Time to compute one day's VDF output",
            )
            .buckets(vec![
                60.0, 3_600.0, 21_600.0, 43_200.0, 86_400.0, 129_600.0, 172_800.0,
            ]),
        )?;
        registry.register(Box::new(vdf_compute_seconds.clone()))?;

        let rbc_deliveries_total = IntCounter::with_opts(Opts::new(
            "conductor_rbc_deliveries_total",
            "Total reliable-broadcast instances that reached Deliver",
        ))?;
        registry.register(Box::new(rbc_deliveries_total.clone()))?;

        let bba_rounds_to_decide = Histogram::with_opts(
            HistogramOpts::new(
                "conductor_bba_rounds_to_decide",
                "Number of rounds a binary agreement instance took to decide",
            )
            .buckets(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 8.0]),
        )?;
        registry.register(Box::new(bba_rounds_to_decide.clone()))?;

        let evidence_total = IntCounterVec::new(
            Opts::new("conductor_evidence_total", "Evidence records emitted, by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(evidence_total.clone()))?;

        let circuit_breaker_state = prometheus::GaugeVec::new(
            Opts::new(
                "conductor_circuit_breaker_state",
                "Per-peer circuit breaker state: 0=closed, 1=open, 2=half-open",
            ),
            &["peer"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let seen_cache_size = IntGauge::with_opts(Opts::new(
            "conductor_seen_cache_size",
            "Current number of entries in the seen-message replay cache",
        ))?;
        registry.register(Box::new(seen_cache_size.clone()))?;

        Ok(Self {
            epoch_duration_seconds,
            vdf_compute_seconds,
            rbc_deliveries_total,
            bba_rounds_to_decide,
            evidence_total,
            circuit_breaker_state,
            seen_cache_size,
        })
    }
}

/// Wrapper around a Prometheus registry and the Conductor metrics. Cheap to
/// clone; the underlying `Registry` and metric handles are reference-counted.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub conductor: ConductorMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("conductor".to_string()), None)?;
        let conductor = ConductorMetrics::register(&registry)?;
        Ok(Self { registry, conductor })
    }

    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server exposing `GET /metrics` in Prometheus text format.
/// All other paths return 404. Intended to be spawned onto the node's
/// general I/O runtime.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics exporter listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!(error = %err, "metrics HTTP connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conductor_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ConductorMetrics::register(&registry).expect("register metrics");

        metrics.epoch_duration_seconds.observe(12.5);
        metrics.vdf_compute_seconds.observe(86_401.0);
        metrics.rbc_deliveries_total.inc();
        metrics.bba_rounds_to_decide.observe(2.0);
        metrics.evidence_total.with_label_values(&["vdf_too_fast"]).inc();
        metrics.circuit_breaker_state.with_label_values(&["peer-1"]).set(1.0);
        metrics.seen_cache_size.set(42);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_contains_metric_names() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.conductor.epoch_duration_seconds.observe(1.0);
        let text = registry.gather_text();
        assert!(text.contains("conductor_epoch_duration_seconds"));
    }
}
