//! Prometheus counters for chat traffic.
//!
//! Each [`Metrics`] owns its own registry so tests and multiple routers in
//! one process never collide on registration.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::relay::RelayOutcome;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    chat_requests: IntCounterVec,
    relay_outcomes: IntCounterVec,
    fragments: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let chat_requests = IntCounterVec::new(
            Opts::new("joi_chat_requests_total", "Chat requests by validation result"),
            &["result"],
        )?;
        let relay_outcomes = IntCounterVec::new(
            Opts::new("joi_relay_outcomes_total", "Finished relay streams by outcome"),
            &["outcome"],
        )?;
        let fragments = IntCounter::new(
            "joi_relay_fragments_total",
            "Text fragments forwarded to clients",
        )?;

        registry.register(Box::new(chat_requests.clone()))?;
        registry.register(Box::new(relay_outcomes.clone()))?;
        registry.register(Box::new(fragments.clone()))?;

        Ok(Self {
            registry,
            chat_requests,
            relay_outcomes,
            fragments,
        })
    }

    pub fn record_request(&self, accepted: bool) {
        let result = if accepted { "accepted" } else { "rejected" };
        self.chat_requests.with_label_values(&[result]).inc();
    }

    pub fn record_fragment(&self) {
        self.fragments.inc();
    }

    pub fn record_outcome(&self, outcome: RelayOutcome) {
        self.relay_outcomes
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn requests(&self, accepted: bool) -> u64 {
        let result = if accepted { "accepted" } else { "rejected" };
        self.chat_requests.with_label_values(&[result]).get()
    }

    pub fn outcomes(&self, outcome: RelayOutcome) -> u64 {
        self.relay_outcomes
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    /// Render all counters in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_fragment();
        metrics.record_outcome(RelayOutcome::Complete);

        assert_eq!(metrics.requests(true), 1);
        assert_eq!(metrics.outcomes(RelayOutcome::Complete), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("joi_chat_requests_total{result=\"rejected\"} 1"));
        assert!(text.contains("joi_relay_fragments_total 1"));
        assert!(text.contains("joi_relay_outcomes_total{outcome=\"complete\"} 1"));
    }
}
