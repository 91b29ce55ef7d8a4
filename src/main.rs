use gas_leak_monitor::{
    api::{build_router, AppState},
    config::Config,
    ingest::{self, ReadingProcessor},
    messaging::MessagingService,
    ml::MlService,
    state::create_store,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Configuration errors are fatal at startup
    let config = Config::load()?;

    init_tracing(&config);

    tracing::info!("Starting gas leak monitor v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        if let Err(e) = gas_leak_monitor::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    tracing::info!("Storage backend: {:?}", config.state.backend);
    let store = create_store(&config.state)?;

    let ml = MlService::new(config.ml.clone(), store.clone());
    ml.start().await?;

    let mut processor = ReadingProcessor::new(store, ml.clone());
    let mut app_state_messaging = None;
    let mut subscriptions = None;

    match MessagingService::new(config.messaging.clone()).await {
        Ok(messaging) if messaging.is_enabled() => {
            let messaging = Arc::new(messaging);
            processor = processor.with_messaging(messaging.clone());

            match ingest::build_router(&processor).start(&messaging).await {
                Ok(handle) => subscriptions = Some(handle),
                Err(e) => tracing::error!("Failed to subscribe to sensor topics: {}", e),
            }
            app_state_messaging = Some(messaging);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("Messaging unavailable, continuing with HTTP only: {}", e);
        }
    }

    let mut app_state = AppState::new(processor);
    if let Some(messaging) = app_state_messaging.clone() {
        app_state = app_state.with_messaging(messaging);
    }
    let app = build_router(app_state);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP API listening on http://{}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    if let Some(handle) = subscriptions {
        handle.shutdown();
    }
    ml.stop().await?;
    if let Some(messaging) = app_state_messaging {
        if let Err(e) = messaging.close().await {
            tracing::warn!("Failed to close messaging: {}", e);
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "gas_leak_monitor={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
