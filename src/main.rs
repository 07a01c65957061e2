use anyhow::Result;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aerovia::config::AppConfig;
use aerovia::events::dispatcher::EventDispatcher;
use aerovia::events::handlers;
use aerovia::infra::broker::EventProducer;
use aerovia::infra::cache::RedisCache;
use aerovia::infra::db::Db;
use aerovia::infra::fanout::NotificationFanout;
use aerovia::infra::mailer::Mailer;
use aerovia::{http, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    let cache = RedisCache::connect(&config.redis_url).await?;
    let mailer = Mailer::from_config(&config)?;
    let producer = EventProducer::new(&config)?;
    let fanout = NotificationFanout::new(cache.clone());

    let state = AppState {
        db,
        cache,
        mailer,
        producer,
        fanout,
        frontend_base_url: config.frontend_base_url.clone(),
        paseto_access_key: config.paseto_access_key,
        paseto_refresh_key: config.paseto_refresh_key,
        access_ttl_minutes: config.access_ttl_minutes,
        refresh_ttl_days: config.refresh_ttl_days,
        reset_token_ttl_minutes: config.reset_token_ttl_minutes,
    };

    // Wire the consumer before serving: the handler map must be complete when
    // polling starts.
    let mut dispatcher = EventDispatcher::new(&config);
    handlers::register_all(&mut dispatcher, &state);
    dispatcher.start(tokio::runtime::Handle::current())?;

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.stop();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
