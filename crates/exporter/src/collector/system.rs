use api_types::NodeRecord;
use api_types::ObjectQuery;
use api_types::ObjectType;
use ontap_client::StorageApi;

use super::fetch_records;
use super::ScrapeContext;
use super::ScrapeResult;
use crate::sample::MetricDesc;
use crate::sample::SampleSink;

const LABELS: &[&str] = &["group", "cluster", "node"];
const INFO_LABELS: &[&str] = &["group", "cluster", "node", "model", "serial", "version"];

const UPTIME: MetricDesc = MetricDesc::gauge(
    "system_uptime_seconds",
    "Uptime of the node in seconds.",
    LABELS,
);
const STATE: MetricDesc = MetricDesc::gauge(
    "system_state",
    "State of the node, 1 (up), 0 (down).",
    LABELS,
);
const INFO: MetricDesc = MetricDesc::gauge(
    "system_info",
    "Node model, serial number and version, value is always 1.",
    INFO_LABELS,
);

const FIELDS: &[&str] = &["name", "model", "serial_number", "uptime", "state", "version.full"];

pub(super) async fn scrape<A: StorageApi + ?Sized>(
    api: &A,
    ctx: &ScrapeContext,
    sink: &SampleSink,
) -> ScrapeResult<()> {
    let nodes: Vec<NodeRecord> =
        fetch_records(api, ObjectType::Node, ObjectQuery::fields(FIELDS), sink).await?;

    for node in &nodes {
        let labels = ctx.labels(&[node.name.as_str()]);
        sink.emit_field(&UPTIME, labels.clone(), node.uptime.as_ref());
        // up / down; "booting", "taken_over" and friends are dropped
        sink.emit_field(&STATE, labels, node.state.as_ref());

        let info_labels = ctx.labels(&[
            node.name.as_str(),
            node.model.as_deref().unwrap_or_default(),
            node.serial_number.as_deref().unwrap_or_default(),
            node.version
                .as_ref()
                .map(|v| v.full.as_str())
                .unwrap_or_default(),
        ]);
        sink.emit(INFO.sample(info_labels, 1.0));
    }
    Ok(())
}
