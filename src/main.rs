use std::sync::Arc;

use impact_portal::{ConfigResolver, PortalError, config::DEFAULT_CONFIG_FILE};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_tracing(loglevel: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(loglevel));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), PortalError> {
    dotenvy::dotenv().ok();

    let config_file =
        std::env::var("PORTAL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let resolver = ConfigResolver::new(config_file);

    // Incomplete configuration is a deployment error: refuse to serve.
    let cfg = match resolver.resolve() {
        Ok(cfg) => {
            init_tracing(&cfg.server.loglevel);
            cfg
        }
        Err(e) => {
            init_tracing(impact_portal::config::DEFAULT_LOGLEVEL);
            error!(config_file = %resolver.file().display(), error = %e, "startup aborted");
            return Err(e.into());
        }
    };

    info!(
        instance = %cfg.instance_connection_name,
        db_user = %cfg.db_user,
        db_name = %cfg.db_name,
        db_host = %cfg.connection.host.as_deref().unwrap_or("<socket>"),
        connect_timeout_secs = cfg.connection.connect_timeout.as_secs(),
        admin_configured = cfg.admin_credentials().is_some(),
        loglevel = %cfg.server.loglevel,
    );
    for warning in cfg.warnings() {
        warn!("{warning}");
    }

    let port = cfg.server.port;
    let state = impact_portal::router::PortalState::new(Arc::new(cfg));
    let app = impact_portal::router::portal_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
