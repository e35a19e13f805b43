use pricing_engine::api::{create_router, AppState};
use pricing_engine::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pricing_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pricing engine...");

    let settings = Settings::load();
    tracing::info!(
        "Configuration loaded: collection_window_ms={}, flush_threshold={}",
        settings.engine.collection_window_ms,
        settings.engine.flush_threshold,
    );

    let state = AppState::new(settings.clone());
    state.start_background_tasks();

    let app = create_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    tracing::info!("pricing engine listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .expect("failed to start server");
}
