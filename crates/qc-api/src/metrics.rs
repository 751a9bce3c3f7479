//! Prometheus counters served on `/metrics`
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct ApiMetrics {
    registry: Registry,
    /// Terminal run statuses
    pub runs: IntCounterVec,
    /// Ad-hoc evaluations by overall outcome
    pub evaluations: IntCounterVec,
    /// Segmentations by chosen strategy
    pub segmentations: IntCounterVec,
    /// HTTP responses by method and status
    pub requests: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let runs = IntCounterVec::new(
            Opts::new("qc_runs_total", "Runs that reached a terminal status"),
            &["status"],
        )?;
        let evaluations = IntCounterVec::new(
            Opts::new("qc_evaluations_total", "Direct evaluations by overall outcome"),
            &["outcome"],
        )?;
        let segmentations = IntCounterVec::new(
            Opts::new("qc_segmentations_total", "Segmentations by strategy"),
            &["strategy"],
        )?;
        let requests = IntCounterVec::new(
            Opts::new("qc_http_requests_total", "HTTP responses"),
            &["method", "status"],
        )?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(evaluations.clone()))?;
        registry.register(Box::new(segmentations.clone()))?;
        registry.register(Box::new(requests.clone()))?;

        Ok(Self {
            registry,
            runs,
            evaluations,
            segmentations,
            requests,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

pub fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_exported() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.runs.with_label_values(&["SUCCEEDED"]).inc();
        metrics.evaluations.with_label_values(&["FAIL"]).inc_by(2);

        let text = encode(metrics.registry()).unwrap();
        assert!(text.contains("qc_runs_total{status=\"SUCCEEDED\"} 1"));
        assert!(text.contains("qc_evaluations_total{outcome=\"FAIL\"} 2"));
    }
}
