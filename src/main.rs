use dotenv::dotenv;
use graph_etl::config::{validate_settings, Settings};
use graph_etl::controller::SyncController;
use graph_etl::observability::{self, Metrics};
use graph_etl::sink::ArangoSink;
use graph_etl::source::SourceAdapter;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new().unwrap_or_else(|e| {
        error!("failed to load configuration: {:?}", e);
        std::process::exit(1);
    });

    if let Err(e) = validate_settings(&settings) {
        error!("invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("loaded settings: {:?}", settings);

    let prometheus_handle = observability::setup_metrics_recorder();
    let metrics = Metrics::new(prometheus_handle);

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&settings.database.url)
        .await?;

    info!("connected to source database");

    let source = SourceAdapter::from_pool(pool);
    let sink = ArangoSink::new(
        settings.arango.url.clone(),
        settings.arango.database_name.clone(),
        settings.arango.username.clone(),
        settings.arango.password.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut controller = SyncController::new(
        settings.database.url.clone(),
        source,
        sink,
        settings.indexer.clone(),
        metrics.clone(),
    );

    let controller_handle = tokio::spawn(async move { controller.run(shutdown_rx).await });

    let router = observability::router(metrics, &settings.application.cors_allow_origin);
    let addr = format!("{}:{}", settings.application.host, settings.application.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("observability server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    shutdown_signal().await;
    info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);

    let drain_timeout = Duration::from_secs(settings.indexer.drain_timeout_sec);
    match tokio::time::timeout(drain_timeout, controller_handle).await {
        Ok(Ok(Ok(()))) => info!("sync controller stopped cleanly"),
        Ok(Ok(Err(e))) => error!(error = %e, "sync controller exited with an error"),
        Ok(Err(e)) => error!(error = %e, "sync controller task panicked"),
        Err(_) => error!("sync controller did not stop within the drain timeout, abandoning"),
    }

    let _ = server_handle.await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
