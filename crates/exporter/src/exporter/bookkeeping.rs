//! The exporter's own health metrics.

use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use prometheus::core::Collector;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;

use super::ExporterError;
use crate::sample::MetricDesc;
use crate::sample::MetricSample;

/// Duration label of the identity check
pub const CONNECTION_LABEL: &str = "connection";

const COLLECTOR_LABELS: &[&str] = &["collector"];

const UP: MetricDesc = MetricDesc::gauge("up", "Whether the NetAPP server is up.", &[]);
const SCRAPES_TOTAL: MetricDesc = MetricDesc::counter(
    "exporter_scrapes_total",
    "Total number of times NetAPP was scraped for metrics.",
    &[],
);
const SCRAPE_ERRORS: MetricDesc = MetricDesc::counter(
    "exporter_scrape_errors_total",
    "Total number of times an error occurred scraping a NetAPP.",
    COLLECTOR_LABELS,
);
const LAST_SCRAPE_ERROR: MetricDesc = MetricDesc::gauge(
    "exporter_last_scrape_error",
    "Whether the last scrape of metrics from NetAPP resulted in an error (1 for error, 0 for success).",
    &[],
);
const COLLECTOR_DURATION: MetricDesc = MetricDesc::gauge(
    "exporter_collector_duration_seconds",
    "Collector time duration.",
    COLLECTOR_LABELS,
);
const DROPPED_SAMPLES: MetricDesc = MetricDesc::counter(
    "exporter_dropped_samples_total",
    "Total number of samples dropped because a field could not be converted.",
    COLLECTOR_LABELS,
);

/// `collector` label value of a roster task
pub fn collector_label(task: &str) -> String {
    format!("collect.{task}")
}

/// Process-lifetime counters of one exporter, registered in its own registry.
pub struct ExporterMetrics {
    registry: Registry,
    pub(super) up: IntGauge,
    pub(super) scrapes_total: IntCounter,
    pub(super) scrape_errors: IntCounterVec,
    pub(super) last_scrape_error: IntGauge,
    pub(super) dropped_samples: IntCounterVec,
}

impl ExporterMetrics {
    /// Register every bookkeeping metric in `registry`.
    ///
    /// Error and drop counters start at zero for every label in `collectors`, so a
    /// task shows up before its first failure.
    pub fn register(
        registry: Registry,
        collectors: &[String],
    ) -> Result<Self, Report<ExporterError>> {
        let up = IntGauge::with_opts(opts(&UP)).change_context(ExporterError::Registry)?;
        let scrapes_total =
            IntCounter::with_opts(opts(&SCRAPES_TOTAL)).change_context(ExporterError::Registry)?;
        let scrape_errors = IntCounterVec::new(opts(&SCRAPE_ERRORS), COLLECTOR_LABELS)
            .change_context(ExporterError::Registry)?;
        let last_scrape_error =
            IntGauge::with_opts(opts(&LAST_SCRAPE_ERROR)).change_context(ExporterError::Registry)?;
        let dropped_samples = IntCounterVec::new(opts(&DROPPED_SAMPLES), COLLECTOR_LABELS)
            .change_context(ExporterError::Registry)?;

        registry
            .register(Box::new(up.clone()))
            .and_then(|()| registry.register(Box::new(scrapes_total.clone())))
            .and_then(|()| registry.register(Box::new(scrape_errors.clone())))
            .and_then(|()| registry.register(Box::new(last_scrape_error.clone())))
            .and_then(|()| registry.register(Box::new(dropped_samples.clone())))
            .change_context(ExporterError::Registry)
            .attach_printable("bookkeeping metrics are already registered")?;

        for label in collectors {
            scrape_errors.with_label_values(&[label.as_str()]);
            dropped_samples.with_label_values(&[label.as_str()]);
        }

        Ok(Self {
            registry,
            up,
            scrapes_total,
            scrape_errors,
            last_scrape_error,
            dropped_samples,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scrapes_total(&self) -> u64 {
        self.scrapes_total.get()
    }

    pub fn scrape_errors(&self, collector: &str) -> u64 {
        self.scrape_errors.with_label_values(&[collector]).get()
    }

    pub fn dropped_samples(&self, collector: &str) -> u64 {
        self.dropped_samples.with_label_values(&[collector]).get()
    }

    /// Current values of every bookkeeping metric, plus one duration sample per entry
    /// of `durations`.
    pub fn samples(&self, durations: &[(String, Duration)]) -> Vec<MetricSample> {
        let mut samples = vec![UP.sample(Vec::new(), self.up.get() as f64)];
        samples.extend(durations.iter().map(|(label, elapsed)| {
            COLLECTOR_DURATION.sample(vec![label.clone()], elapsed.as_secs_f64())
        }));
        samples.push(SCRAPES_TOTAL.sample(Vec::new(), self.scrapes_total.get() as f64));
        samples.extend(counter_vec_samples(&SCRAPE_ERRORS, &self.scrape_errors));
        samples.push(LAST_SCRAPE_ERROR.sample(Vec::new(), self.last_scrape_error.get() as f64));
        samples.extend(counter_vec_samples(&DROPPED_SAMPLES, &self.dropped_samples));
        samples
    }
}

fn opts(desc: &MetricDesc) -> Opts {
    Opts::new(desc.name, desc.help)
}

/// One sample per label combination, sorted by label values
fn counter_vec_samples(desc: &MetricDesc, counters: &IntCounterVec) -> Vec<MetricSample> {
    let mut samples: Vec<MetricSample> = counters
        .collect()
        .iter()
        .flat_map(|family| family.get_metric().iter())
        .map(|metric| {
            let labels = metric
                .get_label()
                .iter()
                .map(|pair| pair.get_value().to_string())
                .collect();
            desc.sample(labels, metric.get_counter().get_value())
        })
        .collect();
    samples.sort_by(|a, b| a.label_values.cmp(&b.label_values));
    samples
}
