use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SHARED_PASSWORD, etc.
    let _ = dotenvy::dotenv();

    let config = fieldmap_api::config::config();

    let default_filter = if config.server.enable_request_logging {
        "fieldmap_api=info,tower_http=debug"
    } else {
        "fieldmap_api=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    tracing::info!("Starting fieldmap API in {:?} mode", config.environment);

    fieldmap_api::server::serve(config.clone()).await
}
