use std::collections::HashMap;

use error_stack::Report;
use error_stack::ResultExt;
use prometheus::proto::Counter;
use prometheus::proto::Gauge;
use prometheus::proto::LabelPair;
use prometheus::proto::Metric;
use prometheus::proto::MetricFamily;
use prometheus::proto::MetricType;
use prometheus::TextEncoder;

use super::full_name;
use super::EncodeError;
use super::SampleEncoder;
use crate::sample::MetricSample;
use crate::sample::ValueKind;

/// Prometheus text exposition format, version 0.0.4
pub struct PrometheusEncoder;

impl PrometheusEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Group samples into families, keeping first-appearance order
    fn families(namespace: &str, samples: &[MetricSample]) -> Vec<MetricFamily> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut families: Vec<MetricFamily> = Vec::new();
        for sample in samples {
            let i = *index.entry(&*sample.name).or_insert_with(|| {
                let mut family = MetricFamily::default();
                family.set_name(full_name(namespace, &sample.name));
                family.set_help(sample.help.to_string());
                family.set_field_type(match sample.kind {
                    ValueKind::Gauge => MetricType::GAUGE,
                    ValueKind::Counter => MetricType::COUNTER,
                });
                families.push(family);
                families.len() - 1
            });
            let family = &mut families[i];
            let metric = to_metric(sample, family.get_field_type());
            family.mut_metric().push(metric);
        }
        families
    }
}

fn to_metric(sample: &MetricSample, kind: MetricType) -> Metric {
    let labels: Vec<LabelPair> = sample
        .label_names
        .iter()
        .zip(sample.label_values.iter())
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.set_name(name.to_string());
            pair.set_value(value.clone());
            pair
        })
        .collect();

    let mut metric = Metric::default();
    metric.set_label(labels.into());
    if kind == MetricType::COUNTER {
        let mut counter = Counter::default();
        counter.set_value(sample.value);
        metric.set_counter(counter);
    } else {
        let mut gauge = Gauge::default();
        gauge.set_value(sample.value);
        metric.set_gauge(gauge);
    }
    metric
}

impl SampleEncoder for PrometheusEncoder {
    fn content_type(&self) -> &'static str {
        "text/plain; version=0.0.4; charset=utf-8"
    }

    fn encode(
        &self,
        namespace: &str,
        samples: &[MetricSample],
        _timestamp: i64,
    ) -> Result<String, Report<EncodeError>> {
        let families = Self::families(namespace, samples);
        TextEncoder::new()
            .encode_to_string(&families)
            .change_context(EncodeError { format: "prometheus" })
    }
}
