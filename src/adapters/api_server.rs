use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::error::Result;

/// Start the API server
pub async fn start_api_server(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("API server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Start the API server in the background
pub fn start_api_server_background(
    state: AppState,
    port: u16,
) -> tokio::task::JoinHandle<Result<()>> {
    tokio::spawn(async move { start_api_server(state, port).await })
}
