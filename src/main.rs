use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::signal;
use tracing::{error, info};

use fitmarket_api as api;
use fitmarket_api::events::{outbox, Broadcaster, LogMailer, NotificationDispatcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Notifications: broadcasts fan out in-process, mail goes to the log transport
    let broadcaster = Broadcaster::new(cfg.broadcast_capacity);
    let dispatcher = NotificationDispatcher::new(
        Arc::new(LogMailer),
        broadcaster.clone(),
        cfg.mail_from.clone(),
    );
    let (stop_outbox, outbox_stopped) = tokio::sync::watch::channel(false);
    let outbox_worker = outbox::start_worker(
        db_arc.clone(),
        dispatcher,
        outbox::OutboxSettings::from(&cfg),
        outbox_stopped,
    );

    let auth_service = Arc::new(api::auth::AuthService::new(api::auth::AuthConfig::new(
        cfg.jwt_secret.clone(),
        Duration::from_secs(cfg.jwt_expiration as u64),
    )));

    let app_state = api::AppState::new(db_arc.clone(), cfg.clone(), auth_service, broadcaster);
    let app = api::build_app(app_state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("fitmarket-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // let the worker finish its current batch
    let _ = stop_outbox.send(true);
    if let Err(e) = outbox_worker.await {
        error!("outbox worker ended abnormally: {}", e);
    }
    if let Ok(db) = Arc::try_unwrap(db_arc) {
        api::db::close_pool(db).await?;
    }
    info!("fitmarket-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
