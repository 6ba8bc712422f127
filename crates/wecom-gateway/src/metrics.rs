use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry, register_histogram_with_registry, Counter,
    CounterVec, Histogram, Registry,
};
use std::sync::Arc;

pub struct GatewayMetrics {
    /// Labelled by `outcome`: verified, forwarded, ignored, rejected, malformed, failed.
    pub callbacks: CounterVec,
    pub forwards_succeeded: Counter,
    pub forwards_failed: Counter,
    pub forwards_dropped: Counter,
    pub request_latency: Histogram,
    pub registry: Arc<Registry>,
}

impl GatewayMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Arc::new(Registry::new());

        let callbacks = register_counter_vec_with_registry!(
            "wecom_gateway_callbacks_total",
            "Callbacks handled, by outcome",
            &["outcome"],
            registry
        )?;

        let forwards_succeeded = register_counter_with_registry!(
            "wecom_gateway_forwards_succeeded_total",
            "Forwards answered by the AI endpoint",
            registry
        )?;

        let forwards_failed = register_counter_with_registry!(
            "wecom_gateway_forwards_failed_total",
            "Forwards that failed or timed out",
            registry
        )?;

        let forwards_dropped = register_counter_with_registry!(
            "wecom_gateway_forwards_dropped_total",
            "Forwards dropped because the queue was full",
            registry
        )?;

        let request_latency = register_histogram_with_registry!(
            "wecom_gateway_request_latency_seconds",
            "Callback handling latency in seconds",
            registry
        )?;

        Ok(Self {
            callbacks,
            forwards_succeeded,
            forwards_failed,
            forwards_dropped,
            request_latency,
            registry,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.callbacks.with_label_values(&[outcome]).inc();
    }

    pub fn outcome_count(&self, outcome: &str) -> f64 {
        self.callbacks.with_label_values(&[outcome]).get()
    }

    pub fn export_prometheus(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
