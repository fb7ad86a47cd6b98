use std::sync::Arc;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reado::config::Config;
use reado::middleware::{
    admission::AdmissionController, metrics::RequestMetrics, timeout::RequestDeadline,
};
use reado::routes::comments::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reado=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting reado server on {}:{}", config.host, config.port);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admission = Arc::new(AdmissionController::new(config.max_concurrent_requests));
    let deadline = RequestDeadline::from_millis(config.request_timeout_ms);

    let state = AppState {
        pool,
        config: config.clone(),
        http: reqwest::Client::new(),
        metrics: Arc::new(RequestMetrics::new()),
    };

    let app = reado::build_router(state, admission, deadline);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
