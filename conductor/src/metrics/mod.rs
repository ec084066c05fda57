//! Metrics and instrumentation for the consensus core (SPEC_FULL.md §B):
//! Prometheus-compatible counters/gauges/histograms plus a small `/metrics`
//! HTTP exporter, in the shape of a typical node in this lineage.

pub mod prometheus;

pub use prometheus::{ConductorMetrics, MetricsRegistry, run_prometheus_http_server};
