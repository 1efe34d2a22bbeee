use error_stack::Report;
use influxdb_line_protocol::LineProtocolBuilder;

use super::full_name;
use super::EncodeError;
use super::SampleEncoder;
use crate::sample::MetricSample;

/// InfluxDB line protocol encoder, one line per sample with a single `value` field
pub struct InfluxEncoder;

impl InfluxEncoder {
    pub fn new() -> Self {
        Self
    }

    fn encode_sample(namespace: &str, sample: &MetricSample, timestamp: i64) -> String {
        let measurement = full_name(namespace, &sample.name);
        let mut builder = LineProtocolBuilder::new().measurement(&measurement);

        // Empty tag values are not representable in line protocol
        for (key, value) in sample.label_names.iter().zip(sample.label_values.iter()) {
            if !value.is_empty() {
                builder = builder.tag(key, value);
            }
        }

        let lp_built = builder
            .field("value", sample.value)
            .timestamp(timestamp)
            .close_line()
            .build();
        String::from_utf8_lossy(&lp_built).into_owned()
    }
}

impl SampleEncoder for InfluxEncoder {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn encode(
        &self,
        namespace: &str,
        samples: &[MetricSample],
        timestamp: i64,
    ) -> Result<String, Report<EncodeError>> {
        Ok(samples
            .iter()
            .filter(|sample| sample.value.is_finite())
            .map(|sample| Self::encode_sample(namespace, sample, timestamp))
            .collect())
    }
}
