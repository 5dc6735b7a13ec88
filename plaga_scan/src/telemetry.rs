use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::{
    collections::HashSet,
    sync::{Arc, OnceLock},
};

static GLOBAL_METRICS: OnceLock<Arc<Metrics>> = OnceLock::new();

pub struct Metrics {
    request_counter: Counter<u64>,
    images_scanned: Counter<u64>,
    detections: Counter<u64>,
    scan_duration: Histogram<u64>,
    provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    /// Builds a meter provider exporting into its own Prometheus registry.
    /// The provider lives as long as the returned value.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("plaga_scan");

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let images_scanned = meter
            .u64_counter("images_scanned_total")
            .with_description("Total number of uploaded images run through the detector")
            .build();

        let detections = meter
            .u64_counter("detections_total")
            .with_description("Total number of pest detections")
            .build();

        let boundaries = generate_boundaries((50, 250, 500, 2000, 10000));

        let scan_duration = meter
            .u64_histogram("scan_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of batch scans in milliseconds")
            .build();

        Ok(Metrics {
            request_counter,
            images_scanned,
            detections,
            scan_duration,
            provider,
            registry,
        })
    }

    /// Process-wide instance. Its provider is installed as the global meter
    /// provider exactly once, so the HTTP metrics layer reports into the same
    /// registry.
    pub fn global() -> anyhow::Result<Arc<Self>> {
        if let Some(metrics) = GLOBAL_METRICS.get() {
            return Ok(metrics.clone());
        }

        let candidate = Arc::new(Self::new()?);
        let metrics = GLOBAL_METRICS.get_or_init(|| {
            global::set_meter_provider(candidate.provider.clone());
            candidate
        });
        Ok(metrics.clone())
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_scan(&self, images: u64, detections: u64, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.images_scanned.add(images, &attributes);
        self.detections.add(detections, &attributes);
        self.scan_duration.record(duration_ms, &attributes);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 50;
    let middle_step: usize = 50;
    let end_step: usize = 250;
    let tail_step: usize = 2000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (50, 150, 250, 750, 4750);
        let get = generate_boundaries(parts);
        let expected = vec![
            50.0, 100.0, 150.0, 200.0, 250.0, 500.0, 750.0, 2750.0, 4750.0,
        ];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_instances_keep_exporting_independently() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_request("/");
        drop(second);

        let names: Vec<String> = first
            .registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.iter().any(|n| n.starts_with("requests_total")), "{:?}", names);
    }

    #[test]
    fn test_global_is_shared() {
        let a = Metrics::global().unwrap();
        let b = Metrics::global().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_metrics_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("/analyze");
        metrics.record_scan(2, 3, 120, "/analyze");

        let families = metrics.registry.gather();
        let names: Vec<String> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.iter().any(|n| n.starts_with("requests_total")));
        assert!(names.iter().any(|n| n.starts_with("scan_duration_ms")));
    }
}
