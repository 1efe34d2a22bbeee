use std::sync::Arc;

use chrono::Utc;
use poem::handler;
use poem::http::StatusCode;
use poem::web::Data;
use poem::web::Html;
use poem::web::Query;
use poem::Response;
use serde::Deserialize;
use tracing::info;
use tracing::warn;

use super::errors::ApiError;
use super::state::AppState;
use crate::encoders::create_encoder;

/// Query parameters of a metrics poll
#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub target: Option<String>,
    pub format: Option<String>,
}

#[handler]
pub async fn index(state: Data<&Arc<AppState>>) -> Html<String> {
    let path = &state.metrics_path;
    Html(format!(
        "<html>\n\
         <head><title>NetApp ONTAP Exporter</title></head>\n\
         <body>\n\
         <h1>NetApp ONTAP Exporter</h1>\n\
         <p><a href=\"{path}?target=cluster1.example.com\">Example metrics for cluster1.example.com</a></p>\n\
         </body>\n\
         </html>\n"
    ))
}

/// Run one scrape pass against `target` and return the encoded samples.
///
/// Always answers 200 once the target resolves to a device; an unreachable array is
/// reported through the `up` sample.
#[handler]
pub async fn metrics(
    query: Query<MetricsQuery>,
    state: Data<&Arc<AppState>>,
) -> poem::Result<Response> {
    let Some(target) = query.target.as_deref().filter(|t| !t.is_empty()) else {
        return Err(poem::Error::from_string(
            "'target' parameter must be specified",
            StatusCode::BAD_REQUEST,
        ));
    };

    let device = state.store.device_for_target(target).map_err(|e| {
        warn!(host = target, error = ?e, "no device config for target");
        poem::Error::from_string(e.current_context().to_string(), StatusCode::NOT_FOUND)
    })?;

    let exporter = state.pool.get_or_create(target, device).map_err(|e| {
        warn!(host = target, error = ?e, "failed to create exporter");
        let status = match e.current_context() {
            ApiError::BadTarget { .. } => StatusCode::BAD_REQUEST,
            ApiError::ServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        poem::Error::from_string(e.current_context().to_string(), status)
    })?;

    let samples = exporter.run_pass().await;
    let encoder = create_encoder(query.format.as_deref().unwrap_or("prometheus"));
    let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let body = encoder
        .encode(&state.namespace, &samples, timestamp)
        .map_err(|e| {
            warn!(host = target, error = ?e, "failed to encode samples");
            poem::Error::from_string(
                e.current_context().to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })?;

    Ok(Response::builder()
        .content_type(encoder.content_type())
        .body(body))
}

#[handler]
pub async fn reload(state: Data<&Arc<AppState>>) -> poem::Result<String> {
    match state.reload() {
        Ok(()) => {
            info!("config reloaded via HTTP");
            Ok("config reloaded\n".to_string())
        }
        Err(e) => {
            warn!(error = ?e, "config reload failed, keeping previous config");
            Err(poem::Error::from_string(
                format!("{e:?}"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
