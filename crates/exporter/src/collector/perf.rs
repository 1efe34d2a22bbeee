//! Performance counter tables.
//!
//! Unlike the object collectors, metric names here are only known at runtime: every
//! scalar counter of a table row becomes `perf_<table>_<counter>`.

use api_types::ObjectQuery;
use api_types::ObjectType;
use api_types::PerfRow;
use error_stack::Report;
use ontap_client::StorageApi;

use super::fetch_records;
use super::ScrapeContext;
use super::ScrapeError;
use super::ScrapeResult;
use crate::sample::MetricSample;
use crate::sample::SampleSink;
use crate::sample::ValueKind;
use crate::status::FieldValue;

const LABELS: &[&str] = &["group", "cluster", "object", "instance", "node"];

const FIELDS: &[&str] = &["id", "properties", "counters"];

/// Counter tables collected when a device does not list its own
pub const DEFAULT_PERF_OBJECTS: &[&str] = &[
    "system",
    "system:node",
    "nfsv3",
    "nfsv3:node",
    "lif",
    "lun",
    "aggregate",
    "disk",
    "workload",
    "processor",
    "processor:node",
    "volume:node",
    "volume:vserver",
    "volume",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PerfScraper {
    objects: Vec<String>,
}

impl PerfScraper {
    pub fn new(objects: Vec<String>) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    /// Collect every configured table.
    ///
    /// A table that fails is logged and skipped; the remaining tables are still
    /// collected and the task reports the failures once all tables were tried.
    pub(super) async fn scrape<A: StorageApi + ?Sized>(
        &self,
        api: &A,
        ctx: &ScrapeContext,
        sink: &SampleSink,
    ) -> ScrapeResult<()> {
        let mut failure: Option<Report<ScrapeError>> = None;

        for object in &self.objects {
            let rows: Vec<PerfRow> = match fetch_records(
                api,
                ObjectType::PerfRows(object.clone()),
                ObjectQuery::fields(FIELDS),
                sink,
            )
            .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(object = %object, error = ?e, "failed to collect counter table");
                    match failure.as_mut() {
                        Some(first) => first.extend_one(e),
                        None => failure = Some(e),
                    }
                    continue;
                }
            };

            let prefix = format!("perf_{}", sanitize(object));
            for row in &rows {
                let instance = row.instance();
                let node = row.node();
                for counter in &row.counters {
                    let value = match FieldValue::from_raw(counter.value.as_ref()) {
                        FieldValue::Absent => continue,
                        FieldValue::Unparseable => {
                            sink.record_dropped();
                            continue;
                        }
                        FieldValue::Value(value) => value,
                    };
                    sink.emit(MetricSample::dynamic(
                        format!("{prefix}_{}", sanitize(&counter.name)),
                        format!("Performance counter {} of {object}.", counter.name),
                        LABELS,
                        ctx.labels(&[object.as_str(), instance.as_str(), node.as_str()]),
                        value,
                        ValueKind::Gauge,
                    ));
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Lowercase, with every character outside `[a-z0-9_]` replaced by `_`
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '_') => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::collector::testing::FakeApi;
    use crate::filter::FilterRule;
    use crate::sample::testing::collecting_sink;
    use crate::sample::testing::drain;

    fn objects(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sanitize_counter_names() {
        assert_eq!(sanitize("system:node"), "system_node");
        assert_eq!(sanitize("CPU-Busy.total"), "cpu_busy_total");
        assert_eq!(sanitize("read_ops"), "read_ops");
    }

    #[test(tokio::test)]
    async fn emits_one_sample_per_scalar_counter() {
        let api = FakeApi::with_cluster("cluster1").records(
            ObjectType::PerfRows("system:node".to_string()),
            serde_json::json!([{
                "id": "node-01",
                "properties": [{"name": "node.name", "value": "node-01"}],
                "counters": [
                    {"name": "cpu_busy", "value": 1234},
                    {"name": "latency_histogram"},
                    {"name": "total_ops", "value": "99"}
                ]
            }]),
        );
        let (sink, mut rx, dropped) = collecting_sink(FilterRule::allow_all());
        let ctx = ScrapeContext::new("prod", "cluster1");

        PerfScraper::new(objects(&["system:node"]))
            .scrape(&api, &ctx, &sink)
            .await
            .expect("should scrape");

        let samples = drain(&mut rx);
        let names: Vec<_> = samples.iter().map(|s| s.name.to_string()).collect();
        assert_eq!(
            names,
            vec!["perf_system_node_cpu_busy", "perf_system_node_total_ops"]
        );
        assert_eq!(
            samples[0].label_values,
            vec!["prod", "cluster1", "system:node", "node-01", "node-01"]
        );
        assert_eq!(samples[1].value, 99.0);
        assert_eq!(dropped.get(), 0);
    }

    #[test(tokio::test)]
    async fn failing_table_does_not_stop_the_others() {
        let api = FakeApi::with_cluster("cluster1")
            .failing(ObjectType::PerfRows("lif".to_string()))
            .records(
                ObjectType::PerfRows("volume".to_string()),
                serde_json::json!({
                    "id": "vol1",
                    "properties": [{"name": "name", "value": "vol1"}],
                    "counters": [{"name": "read_ops", "value": 7}]
                }),
            );
        let (sink, mut rx, _dropped) = collecting_sink(FilterRule::allow_all());
        let ctx = ScrapeContext::new("prod", "cluster1");

        let err = PerfScraper::new(objects(&["lif", "volume"]))
            .scrape(&api, &ctx, &sink)
            .await
            .expect_err("lif should fail");
        assert_eq!(err.current_context().to_string(), "Failed to fetch perf:lif");

        let samples = drain(&mut rx);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "perf_volume_read_ops");
        assert_eq!(samples[0].label("instance"), Some("vol1"));
    }
}
