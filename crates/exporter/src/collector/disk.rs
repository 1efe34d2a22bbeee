use api_types::DiskRecord;
use api_types::ObjectQuery;
use api_types::ObjectType;
use ontap_client::StorageApi;

use super::fetch_records;
use super::ScrapeContext;
use super::ScrapeResult;
use crate::sample::MetricDesc;
use crate::sample::SampleSink;

const LABELS: &[&str] = &["group", "cluster", "disk", "node", "model", "container_type"];

const USABLE_SIZE: MetricDesc =
    MetricDesc::gauge("disk_usable_size", "Usable size of the disk.", LABELS);
const STATE: MetricDesc = MetricDesc::gauge(
    "disk_state",
    "State of the disk, 1 (present), 0 (broken).",
    LABELS,
);

const FIELDS: &[&str] = &["name", "node.name", "model", "container_type", "usable_size", "state"];

pub(super) async fn scrape<A: StorageApi + ?Sized>(
    api: &A,
    ctx: &ScrapeContext,
    sink: &SampleSink,
) -> ScrapeResult<()> {
    let disks: Vec<DiskRecord> =
        fetch_records(api, ObjectType::Disk, ObjectQuery::fields(FIELDS), sink).await?;

    for disk in &disks {
        let labels = ctx.labels(&[
            disk.name.as_str(),
            disk.node_name(),
            disk.model.as_deref().unwrap_or_default(),
            disk.container_type.as_deref().unwrap_or_default(),
        ]);
        sink.emit_field(&USABLE_SIZE, labels.clone(), disk.usable_size.as_ref());
        // present / broken; "copy", "pending", "reconstructing" etc. are dropped
        sink.emit_field(&STATE, labels, disk.state.as_ref());
    }
    Ok(())
}
