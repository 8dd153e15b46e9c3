//! Prometheus metrics
//!
//! Counters for engine traffic, registered once on the default registry and
//! rendered by the `/metrics` endpoint.

use crate::error::{Error, Result};
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};
use std::sync::OnceLock;

/// Engine call counters
pub struct EngineMetrics {
    /// Calls issued, by method
    pub calls: IntCounterVec,
    /// Calls that failed, by method and error class
    pub failures: IntCounterVec,
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let vec = IntCounterVec::new(Opts::new(name, help), labels)
        .expect("static metric definition is valid");
    // A second registration (tests building several clients) is harmless
    let _ = prometheus::register(Box::new(vec.clone()));
    vec
}

/// Process-wide engine metrics
pub fn engine() -> &'static EngineMetrics {
    static METRICS: OnceLock<EngineMetrics> = OnceLock::new();
    METRICS.get_or_init(|| EngineMetrics {
        calls: counter_vec(
            "storage_bridge_engine_calls_total",
            "Engine RPC calls issued",
            &["method"],
        ),
        failures: counter_vec(
            "storage_bridge_engine_failures_total",
            "Engine RPC calls that failed",
            &["method", "kind"],
        ),
    })
}

/// Render every registered metric in the text exposition format
pub fn render() -> Result<(String, String)> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Internal(format!("metrics encoding failed: {}", e)))?;

    let body = String::from_utf8(buffer)
        .map_err(|e| Error::Internal(format!("metrics are not UTF-8: {}", e)))?;
    Ok((encoder.format_type().to_string(), body))
}
