//! Binary entrypoint for the results plane service.
use results_plane::{build_router, config::Settings, AppState};
use results_plane::telemetry::init_logging;
use tracing::info;
use std::{net::SocketAddr, time::Duration};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_logging(&settings.log_level, settings.log_format)?;
    let addr: SocketAddr = settings.listen_addr.parse()?;
    let state = AppState::from_settings(settings).await;
    let app = build_router(state).layer(CorsLayer::permissive());
    info!(%addr, "results-plane listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await { tracing::error!(error=%e, "shutdown.signal_install_failed"); }
        info!("shutdown.signal");
        tokio::time::sleep(Duration::from_millis(200)).await;
    };
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
