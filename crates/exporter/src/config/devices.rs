//! Per-device configuration and the reloadable store holding it.

use core::error::Error;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use serde::Deserialize;

use crate::collector::DEFAULT_PERF_OBJECTS;
use crate::filter::FilterRule;

/// Device key used when no entry matches the requested target
pub const DEFAULT_DEVICE: &str = "default";

#[derive(Debug, derive_more::Display)]
pub enum ConfigError {
    #[display("Failed to read config file {}", path.display())]
    Read { path: PathBuf },
    #[display("Failed to parse config file")]
    Parse,
    #[display("Invalid configuration for device {device}: {reason}")]
    InvalidDevice { device: String, reason: String },
    #[display("No credentials found for target {target}")]
    UnknownTarget { target: String },
}

impl Error for ConfigError {}

/// Credentials, collection and filter settings of one device entry
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub group: String,
    pub username: String,
    pub password: String,
    pub debug: bool,
    /// Skip TLS certificate verification
    pub insecure: bool,
    pub timeout_secs: u64,
    /// Performance counter tables to collect
    pub perfdata: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            group: String::new(),
            username: String::new(),
            password: String::new(),
            debug: false,
            insecure: true,
            timeout_secs: 30,
            perfdata: DEFAULT_PERF_OBJECTS.iter().map(|s| s.to_string()).collect(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("group", &self.group)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("debug", &self.debug)
            .field("insecure", &self.insecure)
            .field("timeout_secs", &self.timeout_secs)
            .field("perfdata", &self.perfdata)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .finish()
    }
}

impl DeviceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The YAML file as written
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub devices: HashMap<String, DeviceConfig>,
}

/// A device entry with its filter already compiled
#[derive(Debug)]
pub struct CompiledDevice {
    /// Key of the entry in the file, `default` for the fallback entry
    pub name: String,
    pub config: DeviceConfig,
    pub filter: Arc<FilterRule>,
}

impl CompiledDevice {
    /// Validate `config` and compile its filter.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidDevice`] for a zero timeout, an empty counter table name
    ///   or a pattern that does not compile
    pub fn compile(name: &str, config: DeviceConfig) -> Result<Self, Report<ConfigError>> {
        let invalid = |reason: &str| ConfigError::InvalidDevice {
            device: name.to_string(),
            reason: reason.to_string(),
        };

        if config.timeout_secs == 0 {
            return Err(Report::new(invalid("timeout_secs must be positive")));
        }
        if config.perfdata.iter().any(|object| object.trim().is_empty()) {
            return Err(Report::new(invalid("perfdata contains an empty table name")));
        }

        let filter = FilterRule::compile(config.include.as_slice(), config.exclude.as_slice())
            .change_context_lazy(|| invalid("bad include/exclude pattern"))?;

        Ok(Self {
            name: name.to_string(),
            config,
            filter: Arc::new(filter),
        })
    }
}

/// Every device of one successfully loaded file
#[derive(Debug, Default)]
pub struct ConfigSnapshot {
    devices: HashMap<String, Arc<CompiledDevice>>,
}

impl ConfigSnapshot {
    /// Read, parse and compile `path`. Nothing is returned unless every device compiles.
    pub fn load(path: &Path) -> Result<Self, Report<ConfigError>> {
        let content = std::fs::read_to_string(path).change_context(ConfigError::Read {
            path: path.to_path_buf(),
        })?;
        Self::parse(&content).attach_printable_lazy(|| format!("config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self, Report<ConfigError>> {
        let file: ConfigFile = serde_yaml::from_str(content).change_context(ConfigError::Parse)?;

        let mut devices = HashMap::with_capacity(file.devices.len());
        for (name, config) in file.devices {
            let device = CompiledDevice::compile(&name, config)?;
            devices.insert(name, Arc::new(device));
        }
        Ok(Self { devices })
    }

    /// Exact device entry for `target`, else the `default` entry
    pub fn device_for_target(&self, target: &str) -> Option<Arc<CompiledDevice>> {
        self.devices
            .get(target)
            .or_else(|| self.devices.get(DEFAULT_DEVICE))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// The live configuration, swapped wholesale on reload
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<ConfigSnapshot>>,
}

impl ConfigStore {
    /// Load `path` for the first time.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Read`] / [`ConfigError::Parse`] if the file is unusable
    /// - [`ConfigError::InvalidDevice`] if any device entry is rejected
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Report<ConfigError>> {
        let path = path.into();
        let snapshot = ConfigSnapshot::load(&path)?;
        tracing::info!(path = %path.display(), devices = snapshot.len(), "loaded config file");
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn from_snapshot(path: impl Into<PathBuf>, snapshot: ConfigSnapshot) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file. On any error the previous configuration stays in force.
    pub fn reload(&self) -> Result<(), Report<ConfigError>> {
        let snapshot = ConfigSnapshot::load(&self.path)?;
        let devices = snapshot.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        tracing::info!(path = %self.path.display(), devices, "reloaded config file");
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Look up the device entry for `target`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownTarget`] if neither `target` nor `default` is configured
    pub fn device_for_target(&self, target: &str) -> Result<Arc<CompiledDevice>, Report<ConfigError>> {
        self.snapshot()
            .device_for_target(target)
            .ok_or_else(|| {
                Report::new(ConfigError::UnknownTarget {
                    target: target.to_string(),
                })
            })
    }
}
