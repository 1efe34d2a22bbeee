use api_types::AggregateRecord;
use api_types::ObjectQuery;
use api_types::ObjectType;
use ontap_client::StorageApi;

use super::fetch_records;
use super::ScrapeContext;
use super::ScrapeResult;
use crate::sample::MetricDesc;
use crate::sample::SampleSink;

const LABELS: &[&str] = &["group", "cluster", "aggr", "node"];

const SIZE_TOTAL: MetricDesc =
    MetricDesc::gauge("aggr_size_total", "Total size of the aggregate.", LABELS);
const SIZE_AVAILABLE: MetricDesc = MetricDesc::gauge(
    "aggr_size_available",
    "Available size of the aggregate.",
    LABELS,
);
const SIZE_USED: MetricDesc =
    MetricDesc::gauge("aggr_size_used", "Used size of the aggregate.", LABELS);
const STATE: MetricDesc = MetricDesc::gauge(
    "aggr_state",
    "State of the aggregate, 1 (online), 0(offline), 2(restricted), or 3(mixed).",
    LABELS,
);

const FIELDS: &[&str] = &[
    "name",
    "node.name",
    "state",
    "space.block_storage.size",
    "space.block_storage.available",
    "space.block_storage.used",
];

pub(super) async fn scrape<A: StorageApi + ?Sized>(
    api: &A,
    ctx: &ScrapeContext,
    sink: &SampleSink,
) -> ScrapeResult<()> {
    let aggregates: Vec<AggregateRecord> =
        fetch_records(api, ObjectType::Aggregate, ObjectQuery::fields(FIELDS), sink).await?;

    for aggr in &aggregates {
        let labels = ctx.labels(&[aggr.name.as_str(), aggr.node_name()]);
        let block_storage = aggr
            .space
            .as_ref()
            .and_then(|s| s.block_storage.clone())
            .unwrap_or_default();

        sink.emit_field(&SIZE_TOTAL, labels.clone(), block_storage.size.as_ref());
        sink.emit_field(&SIZE_AVAILABLE, labels.clone(), block_storage.available.as_ref());
        sink.emit_field(&SIZE_USED, labels.clone(), block_storage.used.as_ref());
        // online / offline / restricted; transitional states such as "relocating" are dropped
        sink.emit_field(&STATE, labels, aggr.state.as_ref());
    }
    Ok(())
}
