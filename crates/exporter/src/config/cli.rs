use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use utils::version;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve metrics for the configured storage arrays
    Serve(ServeArgs),
    /// Validate the device configuration file and exit
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[arg(
        long,
        env = "ONTAP_EXPORTER_CONFIG",
        value_hint = clap::ValueHint::FilePath,
        default_value = "ontap.yml",
        help = "Path to the device configuration file"
    )]
    pub config_file: PathBuf,

    #[arg(
        long,
        env = "ONTAP_EXPORTER_LISTEN_ADDR",
        default_value = "0.0.0.0:9609",
        help = "HTTP listen address"
    )]
    pub listen_addr: String,

    #[arg(
        long,
        default_value = "netapp",
        help = "Prefix of every exposed metric name"
    )]
    pub namespace: String,

    #[arg(
        long,
        default_value = "/metrics",
        value_parser = parse_metrics_path,
        help = "Path under which metrics are exposed"
    )]
    pub metrics_path: String,

    #[arg(
        long,
        env = "ONTAP_EXPORTER_MAX_TARGETS",
        default_value_t = 256,
        help = "Most targets whose exporters are kept between polls"
    )]
    pub max_targets: usize,

    #[arg(
        long,
        env = "ONTAP_EXPORTER_TARGET_IDLE_TIMEOUT",
        default_value_t = 600,
        help = "Seconds after which an unpolled target's exporter is dropped"
    )]
    pub target_idle_timeout: u64,
}

/// Metrics path must be absolute and must not shadow the index or reload routes
fn parse_metrics_path(path: &str) -> Result<String, String> {
    if !path.starts_with('/') {
        return Err(format!("metrics path must start with '/': {path}"));
    }
    if path == "/" || path == "/-/reload" {
        return Err(format!("metrics path {path} is already routed"));
    }
    Ok(path.to_string())
}

#[derive(Args, Clone, Debug)]
pub struct CheckConfigArgs {
    #[arg(
        long,
        env = "ONTAP_EXPORTER_CONFIG",
        value_hint = clap::ValueHint::FilePath,
        default_value = "ontap.yml",
        help = "Path to the device configuration file"
    )]
    pub config_file: PathBuf,
}
