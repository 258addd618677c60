use std::sync::Arc;

use moai_core::config::AppConfig;
use moai_core::onboarding::onboarding_routes;
use moai_core::store::{LibSqlBackend, ProfileStore};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("Moai core v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding", config.http_port);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    // Timings are for machine hosts embedding the library; the service
    // itself only uses the weekly target.
    tracing::info!(
        celebration_timeout_secs = config.machines.celebration_timeout.as_secs(),
        week_complete_dismiss_secs = config.machines.week_complete_dismiss.as_secs(),
        workout_complete_dismiss_secs = config.machines.workout_complete_dismiss.as_secs(),
        match_dismiss_secs = config.machines.match_dismiss.as_secs(),
        weekly_target = config.machines.weekly_target,
        "Machine timing loaded"
    );

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = onboarding_routes(store, &config.machines).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tracing::info!(port = config.http_port, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
