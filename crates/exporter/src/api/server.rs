use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use poem::get;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::post;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use super::errors::ApiError;
use super::handlers::index;
use super::handlers::metrics;
use super::handlers::reload;
use super::state::AppState;

/// Grace period for in-flight polls after shutdown is requested
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes of the publisher
pub fn routes(state: Arc<AppState>) -> impl Endpoint {
    let metrics_path = state.metrics_path.clone();
    Route::new()
        .at("/", get(index))
        .at(metrics_path, get(metrics))
        .at("/-/reload", post(reload))
        .data(state)
        .with(Tracing)
}

/// HTTP server exposing the metrics endpoint
pub struct ApiServer {
    state: Arc<AppState>,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>, listen_addr: String) -> Self {
        Self { state, listen_addr }
    }

    /// Serve until `cancellation_token` is cancelled
    ///
    /// # Errors
    ///
    /// - [`ApiError::ServerError`] if the server fails to start or bind to the address
    pub async fn run(self, cancellation_token: CancellationToken) -> Result<(), Report<ApiError>> {
        info!("Starting HTTP server on {}", self.listen_addr);

        let app = routes(self.state);
        let listener = TcpListener::bind(&self.listen_addr);
        let server = Server::new(listener);

        match server
            .run_with_graceful_shutdown(
                app,
                cancellation_token.cancelled_owned(),
                Some(SHUTDOWN_TIMEOUT),
            )
            .await
        {
            Ok(()) => {
                info!("HTTP server stopped");
                Ok(())
            }
            Err(e) => {
                error!("HTTP server failed: {e}");
                Err(Report::new(ApiError::ServerError {
                    message: format!("Server failed: {e}"),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use api_types::ObjectType;
    use poem::http::StatusCode;
    use poem::test::TestClient;
    use similar_asserts::assert_eq;
    use tempfile::NamedTempFile;
    use test_log::test;

    use super::*;
    use crate::api::pool::testing::fake_factory;
    use crate::api::ExporterPool;
    use crate::collector::testing::FakeApi;
    use crate::config::ConfigStore;

    const CONFIG: &str = r#"
devices:
  filer01:
    group: prod
    perfdata: []
    include: ["^volume_"]
    exclude: ["_used_by_snapshots$"]
  down01:
    group: prod
    perfdata: []
"#;

    fn fake(target: &str) -> FakeApi {
        if target == "down01" {
            return FakeApi::default();
        }
        FakeApi::with_cluster("cluster1")
            .records(
                ObjectType::Volume,
                serde_json::json!({
                    "name": "vol1",
                    "svm": {"name": "svm1"},
                    "state": "online",
                    "space": {"size": 1024, "snapshot": {"used": 10}}
                }),
            )
            .records(
                ObjectType::Aggregate,
                serde_json::json!({"name": "aggr1", "state": "online"}),
            )
    }

    fn setup(config: &str) -> (NamedTempFile, Arc<AppState>) {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(config.as_bytes()).expect("write config");
        let store = ConfigStore::load(file.path()).expect("load config");
        let state = Arc::new(AppState {
            store: Arc::new(store),
            pool: ExporterPool::new(fake_factory(fake)),
            namespace: "netapp".to_string(),
            metrics_path: "/metrics".to_string(),
        });
        (file, state)
    }

    async fn body(resp: poem::test::TestResponse) -> String {
        resp.0.into_body().into_string().await.expect("body")
    }

    #[test(tokio::test)]
    async fn poll_returns_filtered_samples_and_bookkeeping() {
        let (_file, state) = setup(CONFIG);
        let cli = TestClient::new(routes(state));

        let resp = cli.get("/metrics").query("target", &"filer01").send().await;
        resp.assert_status_is_ok();
        let text = body(resp).await;

        assert!(text.contains(
            "netapp_volume_size{group=\"prod\",cluster=\"cluster1\",volume=\"vol1\",vserver=\"svm1\",aggr=\"\",node=\"\"} 1024"
        ));
        assert!(text.contains("netapp_volume_state{"));
        assert!(!text.contains("netapp_volume_size_used_by_snapshots{"));
        assert!(!text.contains("netapp_aggr_state{"));
        assert!(text.contains("netapp_up 1\n"));
        assert!(text.contains("netapp_exporter_scrapes_total 1\n"));
        assert!(text.contains("netapp_exporter_last_scrape_error 0\n"));
    }

    #[test(tokio::test)]
    async fn unreachable_array_still_answers_ok() {
        let (_file, state) = setup(CONFIG);
        let cli = TestClient::new(routes(state));

        let resp = cli.get("/metrics").query("target", &"down01").send().await;
        resp.assert_status_is_ok();
        let text = body(resp).await;

        assert!(text.contains("netapp_up 0\n"));
        assert!(text.contains("netapp_exporter_last_scrape_error 1\n"));
        assert!(!text.contains("netapp_volume_"));
    }

    #[test(tokio::test)]
    async fn missing_and_unknown_targets_are_client_errors() {
        let (_file, state) = setup(CONFIG);
        let cli = TestClient::new(routes(state));

        cli.get("/metrics")
            .send()
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        cli.get("/metrics")
            .query("target", &"nowhere")
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test(tokio::test)]
    async fn counters_persist_across_polls() {
        let (_file, state) = setup(CONFIG);
        let cli = TestClient::new(routes(state.clone()));

        for _ in 0..3 {
            cli.get("/metrics")
                .query("target", &"filer01")
                .send()
                .await
                .assert_status_is_ok();
        }
        let resp = cli.get("/metrics").query("target", &"filer01").send().await;
        assert!(body(resp).await.contains("netapp_exporter_scrapes_total 4\n"));
        assert_eq!(state.pool.len(), 1);
    }

    #[test(tokio::test)]
    async fn json_format_is_selectable() {
        let (_file, state) = setup(CONFIG);
        let cli = TestClient::new(routes(state));

        let resp = cli
            .get("/metrics")
            .query("target", &"filer01")
            .query("format", &"json")
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_content_type("application/x-ndjson");
        let text = body(resp).await;
        for line in text.lines() {
            let parsed: serde_json::Value = serde_json::from_str(line).expect("json line");
            assert!(parsed["name"].as_str().is_some_and(|n| n.starts_with("netapp_")));
        }
    }

    #[test(tokio::test)]
    async fn reload_endpoint_swaps_config_and_clears_pool() {
        let (file, state) = setup(CONFIG);
        let cli = TestClient::new(routes(state.clone()));
        cli.get("/metrics")
            .query("target", &"filer01")
            .send()
            .await
            .assert_status_is_ok();
        assert_eq!(state.pool.len(), 1);

        std::fs::write(file.path(), "devices:\n  default:\n    group: staging\n    perfdata: []\n")
            .expect("rewrite config");
        cli.post("/-/reload").send().await.assert_status_is_ok();
        assert!(state.pool.is_empty());

        let resp = cli.get("/metrics").query("target", &"filer01").send().await;
        let text = body(resp).await;
        assert!(text.contains("group=\"staging\""));
        assert!(text.contains("netapp_aggr_state{"));
    }

    #[test(tokio::test)]
    async fn failed_reload_is_reported_and_keeps_config() {
        let (file, state) = setup(CONFIG);
        let cli = TestClient::new(routes(state.clone()));

        std::fs::write(file.path(), "devices: [not, a, map]\n").expect("rewrite config");
        cli.post("/-/reload")
            .send()
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        cli.get("/metrics")
            .query("target", &"filer01")
            .send()
            .await
            .assert_status_is_ok();
    }

    #[test(tokio::test)]
    async fn index_links_to_metrics_path() {
        let (_file, state) = setup(CONFIG);
        let cli = TestClient::new(routes(state));

        let resp = cli.get("/").send().await;
        resp.assert_status_is_ok();
        assert!(body(resp).await.contains("href=\"/metrics?target="));
    }
}
