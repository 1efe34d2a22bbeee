use api_types::LunRecord;
use api_types::ObjectQuery;
use api_types::ObjectType;
use ontap_client::StorageApi;

use super::fetch_records;
use super::ScrapeContext;
use super::ScrapeResult;
use crate::sample::MetricDesc;
use crate::sample::SampleSink;

const LABELS: &[&str] = &["group", "cluster", "lun", "vserver", "volume"];

const SIZE: MetricDesc = MetricDesc::gauge("lun_size", "Size of the LUN.", LABELS);
const SIZE_USED: MetricDesc = MetricDesc::gauge("lun_size_used", "Used size of the LUN.", LABELS);
const STATE: MetricDesc = MetricDesc::gauge(
    "lun_state",
    "State of the LUN, 1 (online), 0 (offline).",
    LABELS,
);
const MAPPED: MetricDesc = MetricDesc::gauge(
    "lun_mapped",
    "Whether the LUN is mapped to an initiator group, 1 (mapped), 0 (unmapped).",
    LABELS,
);

const FIELDS: &[&str] = &[
    "name",
    "svm.name",
    "location.volume.name",
    "space.size",
    "space.used",
    "status.state",
    "status.mapped",
];

pub(super) async fn scrape<A: StorageApi + ?Sized>(
    api: &A,
    ctx: &ScrapeContext,
    sink: &SampleSink,
) -> ScrapeResult<()> {
    let luns: Vec<LunRecord> =
        fetch_records(api, ObjectType::Lun, ObjectQuery::fields(FIELDS), sink).await?;

    for lun in &luns {
        let labels = ctx.labels(&[lun.name.as_str(), lun.svm_name(), lun.volume_name()]);
        let space = lun.space.clone().unwrap_or_default();
        let status = lun.status.clone().unwrap_or_default();

        sink.emit_field(&SIZE, labels.clone(), space.size.as_ref());
        sink.emit_field(&SIZE_USED, labels.clone(), space.used.as_ref());
        // online / offline; "nvfail" and "foreign_lun_error" are dropped
        sink.emit_field(&STATE, labels.clone(), status.state.as_ref());
        sink.emit_field(&MAPPED, labels, status.mapped.as_ref());
    }
    Ok(())
}
