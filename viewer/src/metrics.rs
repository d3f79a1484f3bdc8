use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref FETCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            "viewer_fetch_requests_total",
            "Total requests issued to the telemetry store"
        ),
        &["channel"]
    )
    .unwrap();
    pub static ref FETCH_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            "viewer_fetch_failures_total",
            "Total fetches degraded to an empty result"
        ),
        &["channel", "reason"]
    )
    .unwrap();
    pub static ref FETCH_EMPTY_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            "viewer_fetch_empty_total",
            "Total successful fetches that returned no records"
        ),
        &["channel"]
    )
    .unwrap();
    pub static ref SKIPPED_RECORDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            "viewer_skipped_records_total",
            "Total remote records dropped for a bad timestamp or value"
        ),
        &["channel"]
    )
    .unwrap();
    pub static ref CYCLES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "viewer_cycles_total",
        "Total completed fetch cycles"
    ))
    .unwrap();
    pub static ref CYCLE_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "viewer_cycle_latency_seconds",
            "Time taken to fetch all channels and update the store"
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    )
    .unwrap();
    pub static ref BUFFER_POINTS: GaugeVec = GaugeVec::new(
        Opts::new("viewer_buffer_points", "Points currently retained per channel"),
        &["channel"]
    )
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(FETCH_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FETCH_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FETCH_EMPTY_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SKIPPED_RECORDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CYCLES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CYCLE_LATENCY_SECONDS.clone()))?;
    REGISTRY.register(Box::new(BUFFER_POINTS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
