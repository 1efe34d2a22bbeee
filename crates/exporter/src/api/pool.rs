use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use error_stack::Report;
use error_stack::ResultExt;
use ontap_client::ClientConfig;
use ontap_client::ClientResult;
use ontap_client::OntapClient;
use ontap_client::StorageApi;

use super::errors::ApiError;
use crate::collector::default_roster;
use crate::config::CompiledDevice;
use crate::config::DeviceConfig;
use crate::exporter::Exporter;

/// Builds the API client for a target host
pub type ApiFactory =
    Box<dyn Fn(&str, &DeviceConfig) -> ClientResult<Arc<dyn StorageApi>> + Send + Sync>;

/// Factory for the REST client
pub fn rest_factory() -> ApiFactory {
    Box::new(|target: &str, device: &DeviceConfig| {
        let config = ClientConfig::for_host(target)
            .with_credentials(device.username.clone(), device.password.clone())
            .with_request_timeout(device.request_timeout())
            .with_insecure(device.insecure)
            .with_debug(device.debug);
        let client: Arc<dyn StorageApi> = Arc::new(OntapClient::new(config)?);
        Ok(client)
    })
}

/// Most targets cached at once
pub const DEFAULT_MAX_TARGETS: usize = 256;
/// Cached exporters not polled for this long are evicted
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

struct PoolEntry {
    device: Arc<CompiledDevice>,
    exporter: Arc<Exporter<dyn StorageApi>>,
    last_used: Instant,
}

/// One exporter per target, so bookkeeping counters survive across polls.
///
/// An entry is rebuilt when the device configuration it was built from is replaced.
/// The pool holds at most `max_targets` entries: idle entries are evicted first, then
/// the least recently polled one. An evicted target starts over with fresh counters.
pub struct ExporterPool {
    factory: ApiFactory,
    entries: Mutex<HashMap<String, PoolEntry>>,
    max_targets: usize,
    idle_timeout: Duration,
}

impl ExporterPool {
    pub fn new(factory: ApiFactory) -> Self {
        Self::with_limits(factory, DEFAULT_MAX_TARGETS, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_limits(factory: ApiFactory, max_targets: usize, idle_timeout: Duration) -> Self {
        Self {
            factory,
            entries: Mutex::new(HashMap::new()),
            max_targets: max_targets.max(1),
            idle_timeout,
        }
    }

    /// Cached exporter for `target`, built from `device` on first use.
    ///
    /// # Errors
    ///
    /// - [`ApiError::BadTarget`] if no client can be built for `target`
    /// - [`ApiError::ServerError`] if the exporter cannot register its metrics
    pub fn get_or_create(
        &self,
        target: &str,
        device: Arc<CompiledDevice>,
    ) -> Result<Arc<Exporter<dyn StorageApi>>, Report<ApiError>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some(entry) = entries.get_mut(target) {
            if Arc::ptr_eq(&entry.device, &device) {
                entry.last_used = now;
                return Ok(entry.exporter.clone());
            }
        }

        let api = (self.factory)(target, &device.config).change_context(ApiError::BadTarget {
            target: target.to_string(),
        })?;
        let exporter = Exporter::new(
            api,
            device.config.group.clone(),
            default_roster(device.config.perfdata.clone()),
            device.filter.clone(),
        )
        .change_context(ApiError::ServerError {
            message: format!("failed to create exporter for {target}"),
        })?;
        let exporter = Arc::new(exporter);

        entries.remove(target);
        self.evict(&mut entries, now);
        tracing::info!(host = target, device = %device.name, "created exporter");
        entries.insert(
            target.to_string(),
            PoolEntry {
                device,
                exporter: exporter.clone(),
                last_used: now,
            },
        );
        Ok(exporter)
    }

    /// Make room for one more entry
    fn evict(&self, entries: &mut HashMap<String, PoolEntry>, now: Instant) {
        entries.retain(|target, entry| {
            let idle = now.saturating_duration_since(entry.last_used) >= self.idle_timeout;
            if idle {
                tracing::debug!(host = %target, "evicting idle exporter");
            }
            !idle
        });
        while entries.len() >= self.max_targets {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(target, _)| target.clone())
            else {
                break;
            };
            tracing::debug!(host = %oldest, "evicting least recently polled exporter");
            entries.remove(&oldest);
        }
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, target: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(target)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::collector::testing::FakeApi;

    /// Factory handing out a fresh [`FakeApi`] built by `make` for every target
    pub(crate) fn fake_factory<F>(make: F) -> ApiFactory
    where
        F: Fn(&str) -> FakeApi + Send + Sync + 'static,
    {
        Box::new(move |target: &str, _device: &DeviceConfig| {
            let api: Arc<dyn StorageApi> = Arc::new(make(target));
            Ok(api)
        })
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::testing::fake_factory;
    use super::*;
    use crate::collector::testing::FakeApi;

    fn device(group: &str) -> Arc<CompiledDevice> {
        let config = DeviceConfig {
            group: group.to_string(),
            ..Default::default()
        };
        Arc::new(CompiledDevice::compile("default", config).expect("valid device"))
    }

    #[test]
    fn reuses_exporter_for_the_same_device() {
        let pool = ExporterPool::new(fake_factory(|_| FakeApi::with_cluster("c1")));
        let device = device("prod");

        let first = pool.get_or_create("filer01", device.clone()).expect("create");
        let second = pool.get_or_create("filer01", device).expect("reuse");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn rebuilds_after_device_change_and_clear() {
        let pool = ExporterPool::new(fake_factory(|_| FakeApi::with_cluster("c1")));
        let first = pool.get_or_create("filer01", device("prod")).expect("create");
        let rebuilt = pool.get_or_create("filer01", device("prod")).expect("rebuild");
        assert!(!Arc::ptr_eq(&first, &rebuilt));

        pool.clear();
        assert!(pool.is_empty());
    }

    #[test]
    fn distinct_targets_stay_within_the_cap() {
        let pool = ExporterPool::with_limits(
            fake_factory(|_| FakeApi::with_cluster("c1")),
            16,
            DEFAULT_IDLE_TIMEOUT,
        );
        let device = device("prod");
        for i in 0..1000 {
            pool.get_or_create(&format!("junk-{i}"), device.clone())
                .expect("create");
        }
        assert_eq!(pool.len(), 16);
        assert!(pool.contains("junk-999"));
        assert!(!pool.contains("junk-0"));
    }

    #[test]
    fn evicts_the_least_recently_polled_target() {
        let pool = ExporterPool::with_limits(
            fake_factory(|_| FakeApi::with_cluster("c1")),
            2,
            DEFAULT_IDLE_TIMEOUT,
        );
        let device = device("prod");
        let filer01 = pool.get_or_create("filer01", device.clone()).expect("create");
        pool.get_or_create("filer02", device.clone()).expect("create");
        std::thread::sleep(Duration::from_millis(2));
        let again = pool.get_or_create("filer01", device.clone()).expect("reuse");
        assert!(Arc::ptr_eq(&filer01, &again));

        pool.get_or_create("filer03", device).expect("create");
        assert_eq!(pool.len(), 2);
        assert!(pool.contains("filer01"));
        assert!(!pool.contains("filer02"));
        assert!(pool.contains("filer03"));
    }

    #[test]
    fn idle_targets_are_evicted() {
        let pool = ExporterPool::with_limits(
            fake_factory(|_| FakeApi::with_cluster("c1")),
            DEFAULT_MAX_TARGETS,
            Duration::ZERO,
        );
        let device = device("prod");
        pool.get_or_create("filer01", device.clone()).expect("create");
        pool.get_or_create("filer02", device).expect("create");
        assert_eq!(pool.len(), 1);
        assert!(pool.contains("filer02"));
    }

    #[test]
    fn rest_factory_rejects_unusable_host() {
        let pool = ExporterPool::new(rest_factory());
        let err = match pool.get_or_create("bad host name", device("prod")) {
            Ok(_) => panic!("should fail"),
            Err(e) => e,
        };
        assert!(matches!(err.current_context(), ApiError::BadTarget { .. }));
    }
}
