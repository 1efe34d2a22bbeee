use api_types::ObjectQuery;
use api_types::ObjectType;
use api_types::SnapshotRecord;
use chrono::DateTime;
use ontap_client::StorageApi;

use super::fetch_records;
use super::ScrapeContext;
use super::ScrapeResult;
use crate::sample::MetricDesc;
use crate::sample::SampleSink;

const LABELS: &[&str] = &["group", "cluster", "snapshot", "volume", "vserver"];

const SIZE: MetricDesc = MetricDesc::gauge("snapshot_size", "Size of the snapshot.", LABELS);
const CREATE_TIME: MetricDesc = MetricDesc::gauge(
    "snapshot_create_time_seconds",
    "Creation time of the snapshot as a Unix timestamp.",
    LABELS,
);

const FIELDS: &[&str] = &["name", "volume.name", "svm.name", "size", "create_time"];

pub(super) async fn scrape<A: StorageApi + ?Sized>(
    api: &A,
    ctx: &ScrapeContext,
    sink: &SampleSink,
) -> ScrapeResult<()> {
    let snapshots: Vec<SnapshotRecord> =
        fetch_records(api, ObjectType::Snapshot, ObjectQuery::fields(FIELDS), sink).await?;

    for snapshot in &snapshots {
        let labels = ctx.labels(&[
            snapshot.name.as_str(),
            snapshot.volume_name(),
            snapshot.svm_name(),
        ]);
        sink.emit_field(&SIZE, labels.clone(), snapshot.size.as_ref());

        let Some(create_time) = snapshot.create_time.as_deref() else {
            continue;
        };
        match DateTime::parse_from_rfc3339(create_time) {
            Ok(ts) => {
                sink.emit(CREATE_TIME.sample(labels, ts.timestamp() as f64));
            }
            Err(e) => {
                tracing::debug!(snapshot = %snapshot.name, create_time, error = %e, "dropping bad timestamp");
                sink.record_dropped();
            }
        }
    }
    Ok(())
}
