use error_stack::Report;
use serde_json::json;

use super::full_name;
use super::EncodeError;
use super::SampleEncoder;
use crate::sample::MetricSample;

/// JSON lines encoder, one object per sample
pub struct JsonEncoder;

impl JsonEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl SampleEncoder for JsonEncoder {
    fn content_type(&self) -> &'static str {
        "application/x-ndjson"
    }

    fn encode(
        &self,
        namespace: &str,
        samples: &[MetricSample],
        timestamp: i64,
    ) -> Result<String, Report<EncodeError>> {
        let mut out = String::new();
        for sample in samples {
            let labels: serde_json::Map<String, serde_json::Value> = sample
                .label_names
                .iter()
                .zip(sample.label_values.iter())
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                .collect();

            let line = json!({
                "name": full_name(namespace, &sample.name),
                "kind": sample.kind,
                "labels": labels,
                "value": sample.value,
                "ts": timestamp,
            });
            out.push_str(&line.to_string());
            out.push('\n');
        }
        Ok(out)
    }
}
