//! Collection tasks.
//!
//! Each task fetches one object class from the array and maps its records to samples.
//! The roster is a closed set, fixed when an [`Exporter`](crate::exporter::Exporter) is
//! built, so tasks are variants of [`Scraper`] rather than trait objects.
//!
//! A task may publish some samples and then fail; what it already wrote stays
//! published and sibling tasks are unaffected.

use core::error::Error;

use api_types::ObjectQuery;
use api_types::ObjectType;
use error_stack::Report;
use error_stack::ResultExt;
use ontap_client::StorageApi;
use serde::de::DeserializeOwned;

use crate::sample::SampleSink;

mod aggregate;
mod disk;
mod lun;
mod perf;
mod snapshot;
mod system;
mod volume;
mod vserver;

pub use perf::PerfScraper;
pub use perf::DEFAULT_PERF_OBJECTS;

/// Label names every domain sample starts with
pub const BASE_LABELS: [&str; 2] = ["group", "cluster"];

/// Result type for collection tasks.
pub type ScrapeResult<T> = Result<T, Report<ScrapeError>>;

#[derive(Debug, derive_more::Display)]
pub enum ScrapeError {
    #[display("Failed to fetch {object}")]
    Fetch { object: String },
    #[display("Malformed response for {object}: none of {records} records could be decoded")]
    MalformedResponse { object: String, records: usize },
    #[display("Collector task panicked: {message}")]
    Panicked { message: String },
}

impl Error for ScrapeError {}

/// Per-scrape values shared by every task of one pass.
///
/// Built after the identity check and handed to each task by reference, so tasks of
/// the same pass always see the same cluster name.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeContext {
    pub group: String,
    pub cluster: String,
}

impl ScrapeContext {
    pub fn new(group: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            cluster: cluster.into(),
        }
    }

    /// Base label values followed by `extra`
    pub fn labels(&self, extra: &[&str]) -> Vec<String> {
        let mut values = Vec::with_capacity(BASE_LABELS.len() + extra.len());
        values.push(self.group.clone());
        values.push(self.cluster.clone());
        values.extend(extra.iter().map(|v| v.to_string()));
        values
    }
}

/// The closed set of collection tasks
#[derive(Debug, Clone, PartialEq)]
pub enum Scraper {
    System,
    Aggregate,
    Vserver,
    Volume,
    Lun,
    Snapshot,
    Disk,
    Perf(PerfScraper),
}

impl Scraper {
    /// Stable identifier, unique within a roster
    pub fn name(&self) -> &'static str {
        match self {
            Scraper::System => "system",
            Scraper::Aggregate => "aggregate",
            Scraper::Vserver => "vserver",
            Scraper::Volume => "volume",
            Scraper::Lun => "lun",
            Scraper::Snapshot => "snapshot",
            Scraper::Disk => "disk",
            Scraper::Perf(_) => "perf",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Scraper::System => "Collect node uptime, state and version info",
            Scraper::Aggregate => "Collect aggregate capacity and state",
            Scraper::Vserver => "Collect vserver state",
            Scraper::Volume => "Collect volume capacity and state",
            Scraper::Lun => "Collect LUN capacity, state and mapping",
            Scraper::Snapshot => "Collect snapshot size and age",
            Scraper::Disk => "Collect disk capacity and state",
            Scraper::Perf(_) => "Collect performance counters",
        }
    }

    /// Run the task once, writing its samples to `sink`.
    pub async fn scrape<A: StorageApi + ?Sized>(
        &self,
        api: &A,
        ctx: &ScrapeContext,
        sink: &SampleSink,
    ) -> ScrapeResult<()> {
        match self {
            Scraper::System => system::scrape(api, ctx, sink).await,
            Scraper::Aggregate => aggregate::scrape(api, ctx, sink).await,
            Scraper::Vserver => vserver::scrape(api, ctx, sink).await,
            Scraper::Volume => volume::scrape(api, ctx, sink).await,
            Scraper::Lun => lun::scrape(api, ctx, sink).await,
            Scraper::Snapshot => snapshot::scrape(api, ctx, sink).await,
            Scraper::Disk => disk::scrape(api, ctx, sink).await,
            Scraper::Perf(perf) => perf.scrape(api, ctx, sink).await,
        }
    }
}

/// The full roster: every object collector plus performance counters for `perf_objects`
pub fn default_roster(perf_objects: Vec<String>) -> Vec<Scraper> {
    vec![
        Scraper::System,
        Scraper::Aggregate,
        Scraper::Vserver,
        Scraper::Volume,
        Scraper::Lun,
        Scraper::Snapshot,
        Scraper::Disk,
        Scraper::Perf(PerfScraper::new(perf_objects)),
    ]
}

/// Fetch every record of `object` and decode them one by one.
///
/// A record that does not decode is dropped and counted on the sink. The task fails
/// only when the fetch fails, or when a non-empty response has no decodable record.
pub(crate) async fn fetch_records<T, A>(
    api: &A,
    object: ObjectType,
    query: ObjectQuery,
    sink: &SampleSink,
) -> ScrapeResult<Vec<T>>
where
    T: DeserializeOwned,
    A: StorageApi + ?Sized,
{
    let raw = api
        .fetch_objects(&object, &query)
        .await
        .change_context(ScrapeError::Fetch {
            object: object.to_string(),
        })?;

    let total = raw.len();
    let mut records = Vec::with_capacity(total);
    for value in raw {
        match serde_json::from_value::<T>(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::debug!(object = %object, error = %e, "dropping malformed record");
                sink.record_dropped();
            }
        }
    }

    if total > 0 && records.is_empty() {
        return Err(Report::new(ScrapeError::MalformedResponse {
            object: object.to_string(),
            records: total,
        }));
    }
    Ok(records)
}


#[cfg(test)]
mod tests {
    use api_types::VolumeRecord;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::testing::FakeApi;
    use super::*;
    use crate::filter::FilterRule;
    use crate::sample::testing::collecting_sink;

    #[test]
    fn context_labels_prefix_base_labels() {
        let ctx = ScrapeContext::new("prod", "cluster1");
        assert_eq!(
            ctx.labels(&["vol1", "svm1"]),
            vec!["prod", "cluster1", "vol1", "svm1"]
        );
    }

    #[test]
    fn roster_names_are_unique() {
        let roster = default_roster(vec!["system".to_string()]);
        let mut names: Vec<_> = roster.iter().map(Scraper::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), roster.len());
        assert_eq!(roster.len(), 8);
    }

    #[test(tokio::test)]
    async fn fetch_records_drops_malformed_records() {
        let api = FakeApi::with_cluster("c1").records(
            ObjectType::Volume,
            serde_json::json!([{"name": "vol1"}, {"name": 42}, {"name": "vol2"}]),
        );
        let (sink, _rx, dropped) = collecting_sink(FilterRule::allow_all());

        let volumes: Vec<VolumeRecord> =
            fetch_records(&api, ObjectType::Volume, ObjectQuery::default(), &sink)
                .await
                .expect("should decode");
        assert_eq!(volumes.len(), 2);
        assert_eq!(dropped.get(), 1);
    }

    #[test(tokio::test)]
    async fn fetch_records_fails_when_nothing_decodes() {
        let api = FakeApi::with_cluster("c1")
            .records(ObjectType::Volume, serde_json::json!([{"name": 1}, {"x": 2}]));
        let (sink, _rx, _dropped) = collecting_sink(FilterRule::allow_all());

        let err = fetch_records::<VolumeRecord, _>(
            &api,
            ObjectType::Volume,
            ObjectQuery::default(),
            &sink,
        )
        .await
        .expect_err("should fail");
        assert!(matches!(
            err.current_context(),
            ScrapeError::MalformedResponse { records: 2, .. }
        ));
    }

    #[test(tokio::test)]
    async fn fetch_records_accepts_empty_listing() {
        let api = FakeApi::with_cluster("c1");
        let (sink, _rx, _dropped) = collecting_sink(FilterRule::allow_all());

        let volumes: Vec<VolumeRecord> =
            fetch_records(&api, ObjectType::Volume, ObjectQuery::default(), &sink)
                .await
                .expect("empty is fine");
        assert!(volumes.is_empty());
    }

    #[test(tokio::test)]
    async fn fetch_records_wraps_client_errors() {
        let api = FakeApi::with_cluster("c1").failing(ObjectType::Disk);
        let (sink, _rx, _dropped) = collecting_sink(FilterRule::allow_all());

        let err = fetch_records::<VolumeRecord, _>(
            &api,
            ObjectType::Disk,
            ObjectQuery::default(),
            &sink,
        )
        .await
        .expect_err("should fail");
        assert_eq!(err.current_context().to_string(), "Failed to fetch disk");
    }
}
