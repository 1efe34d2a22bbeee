//! provides logging helpers

use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Build the env filter used by every binary in the workspace.
///
/// `RUST_LOG` wins when set; otherwise everything at `default_level` and above is kept.
pub fn env_filter(default_level: filter::LevelFilter) -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// initiate the global tracing subscriber
pub fn init() {
    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter(filter::LevelFilter::INFO));

    registry().with(fmt_layer).init();
}
