use axum::http::HeaderValue;
use metrics_exporter_prometheus::PrometheusHandle;
use roomshare::config::DatabaseConfig;
use roomshare::error::AppError;
use roomshare::marketplace::SqliteStore;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Connects to the configured database and brings its schema up to date.
pub(crate) async fn open_store(config: &DatabaseConfig) -> Result<Arc<SqliteStore>, AppError> {
    let store = SqliteStore::connect(config).await?;
    store.migrate().await?;
    info!(url = %config.url, "database ready");
    Ok(Arc::new(store))
}

/// Any origin when the allow list is empty; otherwise exactly the listed origins.
pub(crate) fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
