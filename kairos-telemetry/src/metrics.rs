//! ## kairos-telemetry::metrics
//! **Prometheus counters for the dispatch loop**

use prometheus::{Counter, Histogram, HistogramOpts, IntGauge, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub processed_events: Counter,
    pub blocking_calls: Counter,
    pub queue_depth: IntGauge,
    pub dispatch_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let processed_events =
            Counter::new("kairos_events_total", "Total events dispatched by the controller")?;
        let blocking_calls = Counter::new(
            "kairos_blocking_calls_total",
            "Blocking calls registered through the call/return protocol",
        )?;
        let queue_depth = IntGauge::new("kairos_queue_depth", "Pending events in the scheduler")?;
        let dispatch_latency = Histogram::with_opts(
            HistogramOpts::new(
                "kairos_dispatch_latency_ns",
                "Wall-clock time spent invoking a single event",
            )
            .buckets(vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0]),
        )?;

        registry.register(Box::new(processed_events.clone()))?;
        registry.register(Box::new(blocking_calls.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(dispatch_latency.clone()))?;

        Ok(Self {
            registry,
            processed_events,
            blocking_calls,
            queue_depth,
            dispatch_latency,
        })
    }

    /// Text exposition of every registered metric.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    #[inline]
    pub fn record_dispatch(&self, queue_depth: usize, latency_ns: u64) {
        self.processed_events.inc();
        self.queue_depth
            .set(i64::try_from(queue_depth).unwrap_or(i64::MAX));
        self.dispatch_latency.observe(latency_ns as f64);
    }

    #[inline]
    pub fn inc_blocking_calls(&self) {
        self.blocking_calls.inc();
    }
}
