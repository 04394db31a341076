use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{filter::filter_fn, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use scandata::{
    auth, config,
    middleware::security_log::SECURITY_TARGET,
    routes,
    state::AppState,
    store::{SqliteStore, Store},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (embedded defaults -> scandata.toml -> SCANDATA_CONFIG -> env/.env)
    let mut app_cfg = config::load()?;

    // Logging: stdout + daily rotated app log under ./logs, security events in their own file
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "scandata.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);

    let security_layer = if app_cfg.logging.enable_security_log {
        std::fs::create_dir_all(&app_cfg.logging.security_log_dir).ok();
        let appender = tracing_appender::rolling::daily(&app_cfg.logging.security_log_dir, "security.log");
        let (nb, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(nb)
            .with_filter(filter_fn(|meta| meta.target() == SECURITY_TARGET));
        Some((layer, guard))
    } else {
        None
    };
    let (security_layer, security_guard) = match security_layer {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=info,sqlx=warn", app_cfg.logging.level).into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .with(security_layer)
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard, security_guard);

    if config::ensure_signing_secret(&mut app_cfg) {
        warn!("auth.jwt_secret is not set; using a random per-process secret. Tokens will not survive a restart");
    }
    info!(mode = app_cfg.server.mode.as_str(), "Configuration loaded");

    // Storage
    let db_url = app_cfg.database.url.clone();
    config::ensure_sqlite_parent_dir(&db_url)?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(&db_url, app_cfg.database.max_connections).await?);
    auth::bootstrap_admin(store.as_ref(), &app_cfg).await?;

    let state = AppState::new(store, app_cfg.clone());

    // Evict idle rate-limit windows until shutdown
    let shutdown = CancellationToken::new();
    let sweeper = state.rate_limiter.spawn_sweeper(
        Duration::from_secs(app_cfg.rate_limit.sweep_interval_seconds),
        shutdown.child_token(),
    );

    let app = routes::router(state);

    let host = app_cfg.server.host.clone();
    let port = app_cfg.server.port;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("scandata listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    sweeper.await.ok();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
