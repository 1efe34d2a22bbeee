use core::error::Error;

use error_stack::Report;

use crate::sample::MetricSample;

pub mod influx;
pub mod json;
pub mod prometheus;

/// Trait for encoding one pass worth of samples into a response body
pub trait SampleEncoder: Send + Sync {
    /// `Content-Type` of the encoded body
    fn content_type(&self) -> &'static str;

    /// Encode `samples`, prefixing every name with `{namespace}_`.
    ///
    /// `timestamp` is in nanoseconds since the Unix epoch; formats without explicit
    /// timestamps ignore it.
    fn encode(
        &self,
        namespace: &str,
        samples: &[MetricSample],
        timestamp: i64,
    ) -> Result<String, Report<EncodeError>>;
}

#[derive(Debug, derive_more::Display)]
#[display("failed to encode samples as {format}")]
pub struct EncodeError {
    pub format: &'static str,
}

impl Error for EncodeError {}

/// Full metric name as exposed to scrapers
pub fn full_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}_{name}")
    }
}

/// Encoder for a `format` query value. Anything unknown falls back to the text format.
pub fn create_encoder(format: &str) -> Box<dyn SampleEncoder> {
    match format.to_lowercase().as_str() {
        "json" => Box::new(json::JsonEncoder::new()),
        "influx" => Box::new(influx::InfluxEncoder::new()),
        _ => Box::new(prometheus::PrometheusEncoder::new()),
    }
}
