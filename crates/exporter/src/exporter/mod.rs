//! The scrape orchestrator.
//!
//! One [`Exporter`] exists per target device. Every call to [`Exporter::run_pass`]
//! checks the array identity, fans the roster out as independent tokio tasks, waits
//! for all of them and returns the merged samples followed by the bookkeeping samples.

use core::error::Error;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use error_stack::Report;
use error_stack::ResultExt;
use futures::future::join_all;
use ontap_client::StorageApi;
use prometheus::Registry;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::collector::ScrapeContext;
use crate::collector::ScrapeError;
use crate::collector::Scraper;
use crate::filter::FilterRule;
use crate::sample::MetricSample;
use crate::sample::SampleSink;

mod bookkeeping;

pub use bookkeeping::collector_label;
pub use bookkeeping::ExporterMetrics;
pub use bookkeeping::CONNECTION_LABEL;

#[derive(Debug, derive_more::Display)]
pub enum ExporterError {
    #[display("Failed to register exporter metrics")]
    Registry,
}

impl Error for ExporterError {}

/// Failure of a pass as a whole. The pass still produces bookkeeping output.
#[derive(Debug, derive_more::Display)]
pub enum PassError {
    #[display("Cluster identity unavailable")]
    IdentityUnavailable,
}

impl Error for PassError {}

/// Timing and result of one task in one pass
#[derive(Debug)]
pub struct ScrapeOutcome {
    /// `collect.<name>`
    pub label: String,
    pub duration: Duration,
    pub error: Option<Report<ScrapeError>>,
}

pub struct Exporter<A: StorageApi + ?Sized> {
    api: Arc<A>,
    group: String,
    roster: Vec<Scraper>,
    filter: Arc<FilterRule>,
    metrics: ExporterMetrics,
    pass_lock: Mutex<()>,
}

impl<A: StorageApi + ?Sized> Exporter<A> {
    pub fn new(
        api: Arc<A>,
        group: impl Into<String>,
        roster: Vec<Scraper>,
        filter: Arc<FilterRule>,
    ) -> Result<Self, Report<ExporterError>> {
        Self::with_registry(api, group, roster, filter, Registry::new())
    }

    /// Build an exporter whose bookkeeping metrics live in `registry`.
    ///
    /// # Errors
    ///
    /// - [`ExporterError::Registry`] if `registry` already holds the bookkeeping metrics
    pub fn with_registry(
        api: Arc<A>,
        group: impl Into<String>,
        roster: Vec<Scraper>,
        filter: Arc<FilterRule>,
        registry: Registry,
    ) -> Result<Self, Report<ExporterError>> {
        let labels: Vec<String> = roster.iter().map(|s| collector_label(s.name())).collect();
        let metrics = ExporterMetrics::register(registry, &labels)?;
        Ok(Self {
            api,
            group: group.into(),
            roster,
            filter,
            metrics,
            pass_lock: Mutex::new(()),
        })
    }

    pub fn roster(&self) -> &[Scraper] {
        &self.roster
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    /// Run one complete pass.
    ///
    /// Passes on the same exporter are serialized. Never fails: an unreachable array
    /// yields `up 0` and the bookkeeping samples, a failing task yields its error
    /// counter and whatever samples it wrote before failing.
    pub async fn run_pass(&self) -> Vec<MetricSample> {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();
        self.metrics.scrapes_total.inc();

        let identity_started = Instant::now();
        let identity = self
            .api
            .fetch_identity()
            .await
            .change_context(PassError::IdentityUnavailable);
        let mut durations = vec![(CONNECTION_LABEL.to_string(), identity_started.elapsed())];

        let identity = match identity {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = ?e, "identity check failed, skipping collectors");
                self.metrics.up.set(0);
                self.metrics.last_scrape_error.set(1);
                return self.metrics.samples(&durations);
            }
        };
        self.metrics.up.set(1);

        let ctx = Arc::new(ScrapeContext::new(self.group.clone(), identity.name));
        let (samples, outcomes) = self.fan_out(ctx).await;

        let mut failed = false;
        for outcome in outcomes {
            if let Some(e) = &outcome.error {
                failed = true;
                tracing::error!(collector = %outcome.label, error = ?e, "collector failed");
                self.metrics
                    .scrape_errors
                    .with_label_values(&[outcome.label.as_str()])
                    .inc();
            }
            durations.push((outcome.label, outcome.duration));
        }
        self.metrics.last_scrape_error.set(i64::from(failed));

        tracing::debug!(
            elapsed = ?started.elapsed(),
            samples = samples.len(),
            "scrape pass complete"
        );

        let mut output = samples;
        output.extend(self.metrics.samples(&durations));
        output
    }

    /// Spawn every roster task and wait for all of them.
    async fn fan_out(&self, ctx: Arc<ScrapeContext>) -> (Vec<MetricSample>, Vec<ScrapeOutcome>) {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handles = self.roster.iter().map(|scraper| {
            let label = collector_label(scraper.name());
            let sink = SampleSink::new(
                tx.clone(),
                self.filter.clone(),
                self.metrics
                    .dropped_samples
                    .with_label_values(&[label.as_str()]),
            );
            let scraper = scraper.clone();
            let api = self.api.clone();
            let ctx = ctx.clone();
            let handle = tokio::spawn(async move {
                tracing::debug!(collector = scraper.name(), "collector started");
                let started = Instant::now();
                let result = scraper.scrape(api.as_ref(), &ctx, &sink).await;
                (started.elapsed(), result)
            });
            (label, Instant::now(), handle)
        });
        let handles: Vec<_> = handles.collect();
        drop(tx);

        let (labels, handles): (Vec<_>, Vec<_>) = handles
            .into_iter()
            .map(|(label, spawned, handle)| ((label, spawned), handle))
            .unzip();
        let results = join_all(handles).await;

        let outcomes = labels
            .into_iter()
            .zip(results)
            .map(|((label, spawned), joined)| match joined {
                Ok((duration, result)) => ScrapeOutcome {
                    label,
                    duration,
                    error: result.err(),
                },
                Err(e) => ScrapeOutcome {
                    label,
                    duration: spawned.elapsed(),
                    error: Some(Report::new(ScrapeError::Panicked {
                        message: e.to_string(),
                    })),
                },
            })
            .collect();

        let mut samples = Vec::new();
        while let Ok(sample) = rx.try_recv() {
            samples.push(sample);
        }
        (samples, outcomes)
    }
}
