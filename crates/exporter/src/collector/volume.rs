use api_types::ObjectQuery;
use api_types::ObjectType;
use api_types::VolumeRecord;
use ontap_client::StorageApi;

use super::fetch_records;
use super::ScrapeContext;
use super::ScrapeResult;
use crate::sample::MetricDesc;
use crate::sample::SampleSink;

const LABELS: &[&str] = &["group", "cluster", "volume", "vserver", "aggr", "node"];

const SIZE: MetricDesc = MetricDesc::gauge("volume_size", "Size of the volume.", LABELS);
const SIZE_AVAILABLE: MetricDesc = MetricDesc::gauge(
    "volume_size_available",
    "Available Size of the volume.",
    LABELS,
);
const SIZE_TOTAL: MetricDesc =
    MetricDesc::gauge("volume_size_total", "Total Size of the volume.", LABELS);
const SIZE_USED: MetricDesc =
    MetricDesc::gauge("volume_size_used", "Used Size of the volume.", LABELS);
const SIZE_USED_BY_SNAPSHOTS: MetricDesc = MetricDesc::gauge(
    "volume_size_used_by_snapshots",
    "Used Size By Snapshots of the volume.",
    LABELS,
);
const SNAPSHOT_RESERVE_SIZE: MetricDesc = MetricDesc::gauge(
    "volume_snapshot_reserve_size",
    "Reserve Size By Snapshots of the volume.",
    LABELS,
);
const STATE: MetricDesc = MetricDesc::gauge(
    "volume_state",
    "State of the volume, 1 (online), 0(offline), 2(restricted), or 3(mixed).",
    LABELS,
);

const FIELDS: &[&str] = &[
    "name",
    "svm.name",
    "aggregates.name",
    "state",
    "space.size",
    "space.available",
    "space.afs_total",
    "space.used",
    "space.snapshot.used",
    "space.snapshot.reserve_size",
];

pub(super) async fn scrape<A: StorageApi + ?Sized>(
    api: &A,
    ctx: &ScrapeContext,
    sink: &SampleSink,
) -> ScrapeResult<()> {
    let volumes: Vec<VolumeRecord> =
        fetch_records(api, ObjectType::Volume, ObjectQuery::fields(FIELDS), sink).await?;

    for volume in &volumes {
        let labels = ctx.labels(&[
            volume.name.as_str(),
            volume.svm_name(),
            volume.aggregate_name(),
            volume.node_name(),
        ]);
        let space = volume.space.clone().unwrap_or_default();
        let snapshot = space.snapshot.clone().unwrap_or_default();

        sink.emit_field(&SIZE, labels.clone(), space.size.as_ref());
        sink.emit_field(&SIZE_AVAILABLE, labels.clone(), space.available.as_ref());
        sink.emit_field(&SIZE_TOTAL, labels.clone(), space.total.as_ref());
        sink.emit_field(&SIZE_USED, labels.clone(), space.used.as_ref());
        sink.emit_field(&SIZE_USED_BY_SNAPSHOTS, labels.clone(), snapshot.used.as_ref());
        sink.emit_field(
            &SNAPSHOT_RESERVE_SIZE,
            labels.clone(),
            snapshot.reserve_size.as_ref(),
        );
        // online / offline / restricted / mixed; any other word drops only this sample
        sink.emit_field(&STATE, labels, volume.state.as_ref());
    }
    Ok(())
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

    #[test(tokio::test)]
    async fn maps_volume_fields_to_samples() {
        let api = FakeApi::with_cluster("cluster1").records(
            ObjectType::Volume,
            serde_json::json!([{
                "name": "vol1",
                "svm": {"name": "svm1"},
                "aggregates": [{"name": "aggr1"}],
                "state": "online",
                "space": {
                    "size": 1000,
                    "available": "400",
                    "afs_total": 950,
                    "used": 550,
                    "snapshot": {"used": 20, "reserve_size": 50}
                }
            }]),
        );
        let (sink, mut rx, dropped) = collecting_sink(FilterRule::allow_all());
        let ctx = ScrapeContext::new("prod", "cluster1");

        scrape(&api, &ctx, &sink).await.expect("should scrape");

        let samples = drain(&mut rx);
        let names: Vec<_> = samples.iter().map(|s| s.name.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "volume_size",
                "volume_size_available",
                "volume_size_total",
                "volume_size_used",
                "volume_size_used_by_snapshots",
                "volume_snapshot_reserve_size",
                "volume_state",
            ]
        );
        assert_eq!(
            samples[0].label_values,
            vec!["prod", "cluster1", "vol1", "svm1", "aggr1", ""]
        );
        assert_eq!(samples[1].value, 400.0);
        assert_eq!(samples[6].value, 1.0);
        assert_eq!(dropped.get(), 0);
    }

    #[test(tokio::test)]
    async fn unknown_state_drops_only_that_sample() {
        let api = FakeApi::with_cluster("cluster1").records(
            ObjectType::Volume,
            serde_json::json!([{"name": "vol1", "state": "degraded", "space": {"size": 10}}]),
        );
        let (sink, mut rx, dropped) = collecting_sink(FilterRule::allow_all());
        let ctx = ScrapeContext::new("prod", "cluster1");

        scrape(&api, &ctx, &sink).await.expect("should scrape");

        let samples = drain(&mut rx);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "volume_size");
        assert_eq!(dropped.get(), 1);
    }
}
