//! Inbound HTTP surface: a single resolution endpoint plus a health probe.

mod handlers;
mod models;
mod router;
mod state;

pub use models::{GetGeoRequest, WarningsResponse};
pub use state::AppState;

use std::sync::Arc;

use tracing::info;

use crate::cascade::ResolutionPipeline;
use crate::config::ServerConfig;

/// Binds the router and serves until the process is stopped.
pub async fn serve(config: &ServerConfig, pipeline: Arc<ResolutionPipeline>) -> anyhow::Result<()> {
    let state = AppState { pipeline };
    let app = router::app_router(state);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "georesolver listening");
    axum::serve(listener, app).await?;
    Ok(())
}
