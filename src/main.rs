use tracing_subscriber::EnvFilter;

use movie_recommender_api::{
    api::{create_router, AppState},
    config::Config,
    services::ServiceHandles,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("movie_recommender_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!(artifacts = %config.artifacts_path, "Initializing backend services");
    let services = ServiceHandles::initialize(&config).await;
    if let Some(error) = services.init_error.as_deref() {
        tracing::warn!(error = %error, "Starting in degraded mode");
    }

    let app = create_router(AppState::new(services), &config.cors_origin_list());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
