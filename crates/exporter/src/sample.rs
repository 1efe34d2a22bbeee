//! Metric samples and the per-task sink they are written to.

use std::borrow::Cow;
use std::sync::Arc;

use api_types::RawValue;
use prometheus::IntCounter;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::filter::FilterRule;
use crate::status::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Gauge,
    Counter,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Gauge => "gauge",
            ValueKind::Counter => "counter",
        }
    }
}

/// Static description of a metric family: bare name, help text and label schema.
#[derive(Debug)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
    pub kind: ValueKind,
}

impl MetricDesc {
    pub const fn gauge(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            kind: ValueKind::Gauge,
        }
    }

    pub const fn counter(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            kind: ValueKind::Counter,
        }
    }

    pub fn sample(&self, label_values: Vec<String>, value: f64) -> MetricSample {
        MetricSample {
            name: Cow::Borrowed(self.name),
            help: Cow::Borrowed(self.help),
            label_names: self.labels,
            label_values,
            value,
            kind: self.kind,
        }
    }
}

/// One point-in-time value, positionally labelled by `label_names`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Bare name, without the namespace prefix
    pub name: Cow<'static, str>,
    pub help: Cow<'static, str>,
    pub label_names: &'static [&'static str],
    pub label_values: Vec<String>,
    pub value: f64,
    pub kind: ValueKind,
}

impl MetricSample {
    /// Sample whose name is only known at runtime (performance counters)
    pub fn dynamic(
        name: String,
        help: String,
        label_names: &'static [&'static str],
        label_values: Vec<String>,
        value: f64,
        kind: ValueKind,
    ) -> Self {
        Self {
            name: Cow::Owned(name),
            help: Cow::Owned(help),
            label_names,
            label_values,
            value,
            kind,
        }
    }

    pub fn has_valid_arity(&self) -> bool {
        self.label_names.len() == self.label_values.len()
    }

    /// Value of the label called `name`, if the schema has one
    pub fn label(&self, name: &str) -> Option<&str> {
        self.label_names
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Output of one collection task.
///
/// Each task gets its own clone; every write is one whole sample on an unbounded
/// channel, so concurrent tasks never block each other or interleave partial samples.
/// Samples rejected by the filter are discarded here, before they reach the channel.
#[derive(Clone)]
pub struct SampleSink {
    tx: mpsc::UnboundedSender<MetricSample>,
    filter: Arc<FilterRule>,
    dropped: IntCounter,
}

impl SampleSink {
    pub fn new(
        tx: mpsc::UnboundedSender<MetricSample>,
        filter: Arc<FilterRule>,
        dropped: IntCounter,
    ) -> Self {
        Self {
            tx,
            filter,
            dropped,
        }
    }

    /// Publish a sample. Returns `false` if it was filtered out or dropped.
    pub fn emit(&self, sample: MetricSample) -> bool {
        if !sample.has_valid_arity() {
            tracing::debug!(
                metric = %sample.name,
                expected = sample.label_names.len(),
                got = sample.label_values.len(),
                "dropping sample with wrong label count"
            );
            self.dropped.inc();
            return false;
        }
        if !self.filter.accept(&sample.name) {
            return false;
        }
        self.tx.send(sample).is_ok()
    }

    /// Publish `desc` from a raw API field.
    ///
    /// Absent fields are skipped without a trace. Values that do not convert are
    /// dropped and counted, and the rest of the record is still published.
    pub fn emit_field(
        &self,
        desc: &MetricDesc,
        label_values: Vec<String>,
        raw: Option<&RawValue>,
    ) -> bool {
        match FieldValue::from_raw(raw) {
            FieldValue::Absent => false,
            FieldValue::Unparseable => {
                tracing::debug!(metric = desc.name, raw = ?raw, "dropping unparseable value");
                self.dropped.inc();
                false
            }
            FieldValue::Value(value) => self.emit(desc.sample(label_values, value)),
        }
    }

    /// Count a sample that could not be produced at all
    pub fn record_dropped(&self) {
        self.dropped.inc();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A sink backed by a fresh channel and an unregistered drop counter
    pub(crate) fn collecting_sink(
        filter: FilterRule,
    ) -> (SampleSink, mpsc::UnboundedReceiver<MetricSample>, IntCounter) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dropped = IntCounter::new("test_dropped_total", "test").expect("valid counter");
        (
            SampleSink::new(tx, Arc::new(filter), dropped.clone()),
            rx,
            dropped,
        )
    }

    pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<MetricSample>) -> Vec<MetricSample> {
        let mut samples = Vec::new();
        while let Ok(sample) = rx.try_recv() {
            samples.push(sample);
        }
        samples
    }
}
