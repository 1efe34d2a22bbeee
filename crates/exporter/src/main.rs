use anyhow::Result;
use clap::Parser;
use ontap_exporter::app::Application;
use ontap_exporter::config::CheckConfigArgs;
use ontap_exporter::config::Cli;
use ontap_exporter::config::Commands;
use ontap_exporter::config::ConfigSnapshot;
use ontap_exporter::config::ServeArgs;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();
    utils::logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(serve_args) => run_serve(serve_args).await,
        Commands::CheckConfig(check_args) => run_check_config(check_args),
    }
}

async fn run_serve(serve_args: ServeArgs) -> Result<()> {
    tracing::info!("Starting ontap-exporter {}", &**version::VERSION);

    let app = Application::build(serve_args)
        .map_err(|e| anyhow::anyhow!("Failed to build application: {e:?}"))?;
    app.run()
        .await
        .map_err(|e| anyhow::anyhow!("Server failed: {e:?}"))?;

    Ok(())
}

fn run_check_config(check_args: CheckConfigArgs) -> Result<()> {
    let snapshot = ConfigSnapshot::load(&check_args.config_file)
        .map_err(|e| anyhow::anyhow!("Invalid config: {e:?}"))?;
    tracing::info!(
        path = %check_args.config_file.display(),
        devices = snapshot.len(),
        "config is valid"
    );
    Ok(())
}
