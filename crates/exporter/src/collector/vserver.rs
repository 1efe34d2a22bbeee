use api_types::ObjectQuery;
use api_types::ObjectType;
use api_types::SvmRecord;
use ontap_client::StorageApi;

use super::fetch_records;
use super::ScrapeContext;
use super::ScrapeResult;
use crate::sample::MetricDesc;
use crate::sample::SampleSink;

const LABELS: &[&str] = &["group", "cluster", "vserver", "type"];

const VOLUME_DELETE_RETENTION_HOURS: MetricDesc = MetricDesc::gauge(
    "vserver_volume_delete_retention_hours",
    "Volume Delete Retention Hours of the vserver.",
    LABELS,
);
const ADMIN_STATE: MetricDesc = MetricDesc::gauge(
    "vserver_state",
    "Admin State of the vserver,1(running), 0(stopped), 2(starting),3(stopping), 4(initializing), or 5(deleting).",
    LABELS,
);
const OPERATIONAL_STATE: MetricDesc = MetricDesc::gauge(
    "vserver_operational_state",
    "Operational State of the vserver, 1(running), 0(stopped).",
    LABELS,
);

const FIELDS: &[&str] = &["name", "subtype", "state", "operational_state", "retention_period"];

pub(super) async fn scrape<A: StorageApi + ?Sized>(
    api: &A,
    ctx: &ScrapeContext,
    sink: &SampleSink,
) -> ScrapeResult<()> {
    let svms: Vec<SvmRecord> =
        fetch_records(api, ObjectType::Svm, ObjectQuery::fields(FIELDS), sink).await?;

    for svm in &svms {
        let labels = ctx.labels(&[svm.name.as_str(), svm.r#type.as_deref().unwrap_or_default()]);

        sink.emit_field(
            &VOLUME_DELETE_RETENTION_HOURS,
            labels.clone(),
            svm.volume_delete_retention_hours.as_ref(),
        );
        // running / stopped / starting / stopping / initializing / deleting
        sink.emit_field(&ADMIN_STATE, labels.clone(), svm.state.as_ref());
        sink.emit_field(&OPERATIONAL_STATE, labels, svm.operational_state.as_ref());
    }
    Ok(())
}
