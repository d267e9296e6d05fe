use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::database::{open_store, PolygonStore};
use crate::handlers;
use crate::middleware::{require_api_session, require_page_session};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PolygonStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn PolygonStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/health", get(handlers::system::health))
        .route("/login", get(handlers::pages::login_form))
        .route("/api/map-config", get(handlers::system::map_config))
        .route("/api/auth", post(handlers::auth::login).delete(handlers::auth::logout))
        // Protected
        .merge(polygon_routes(&state))
        .merge(page_routes(&state))
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn polygon_routes(state: &AppState) -> Router<AppState> {
    use handlers::polygons;

    Router::new()
        .route("/api/polygons", get(polygons::list).post(polygons::create))
        .route("/api/polygons/:id", delete(polygons::delete))
        .route_layer(from_fn_with_state(state.clone(), require_api_session))
}

fn page_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::pages::index))
        .route_layer(from_fn_with_state(state.clone(), require_page_session))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    // Credentials (the session cookie) require an explicit origin list
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Open the store, bind, and serve until ctrl-c.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    if config.is_production() && config.security.session_secret.is_empty() {
        anyhow::bail!("SESSION_SECRET must be set in production");
    }
    if config.security.shared_password.is_empty() {
        warn!("SHARED_PASSWORD is empty; every login attempt will be rejected");
    }

    let store = open_store(&config.database).await?;
    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let state = AppState::new(config, store);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;
    info!("fieldmap API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
