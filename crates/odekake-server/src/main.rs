mod api;
mod cors;
mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};
use crate::middleware::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = odekake_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let table = Arc::new(odekake_core::FacilityTable::load(&config.facilities_path)?);
    tracing::info!(
        facilities = table.len(),
        path = %config.facilities_path.display(),
        "loaded facility table"
    );

    let holidays = Arc::new(odekake_core::StaticHolidayCalendar::japan_2025());
    let resolver = odekake_resolver::Resolver::from_config(&config, Arc::clone(&table), holidays)?;

    let limiter = RateLimiter::new(config.per_ip_limit, config.global_limit);
    let app = build_app(
        AppState {
            resolver: Arc::new(resolver),
        },
        limiter,
        cors::build_cors(&config.cors_allowed_origins),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
