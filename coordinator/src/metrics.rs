//! Prometheus metrics (ambient, §4.10 of SPEC_FULL.md). Grounded on the
//! teacher's `get_metrics` handler and `prometheus` dependency in
//! `coordinator/src/routes.rs`.

use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntGauge;
use prometheus::Registry;
use prometheus::TextEncoder;

pub struct Metrics {
    registry: Registry,
    pub orders_published: IntCounter,
    pub retransmissions: IntCounter,
    pub scheduler_picks: IntCounter,
    pub orders_in_flight: IntGauge,
}

impl Metrics {
    pub fn new() -> Metrics {
        let registry = Registry::new();

        let orders_published =
            IntCounter::new("satellite_orders_published_total", "Orders published to a channel topic")
                .expect("metric name/help are valid");
        let retransmissions = IntCounter::new(
            "satellite_retransmissions_total",
            "Orders re-queued by the retransmission controller",
        )
        .expect("metric name/help are valid");
        let scheduler_picks = IntCounter::new(
            "satellite_scheduler_picks_total",
            "Orders selected by the scheduler for transmission",
        )
        .expect("metric name/help are valid");
        let orders_in_flight = IntGauge::new(
            "satellite_orders_in_flight",
            "Orders currently transmitting or confirming",
        )
        .expect("metric name/help are valid");

        registry
            .register(Box::new(orders_published.clone()))
            .expect("metric registered once");
        registry
            .register(Box::new(retransmissions.clone()))
            .expect("metric registered once");
        registry
            .register(Box::new(scheduler_picks.clone()))
            .expect("metric registered once");
        registry
            .register(Box::new(orders_in_flight.clone()))
            .expect("metric registered once");

        Metrics {
            registry,
            orders_published,
            retransmissions,
            scheduler_picks,
            orders_in_flight,
        }
    }

    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("text encoding never fails");
        String::from_utf8(buffer).expect("prometheus text format is valid UTF-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}
