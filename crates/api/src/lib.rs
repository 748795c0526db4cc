mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{MarketData, Result};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<dyn MarketData>,
    /// Bearer token required on `/api/*`; `None` leaves the API open.
    pub dashboard_token: Option<String>,
}

impl AppState {
    pub fn new(market: Arc<dyn MarketData>, dashboard_token: Option<String>) -> Self {
        Self {
            market,
            dashboard_token,
        }
    }
}

/// Assemble the dashboard router: API, health check and embedded UI.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .merge(routes::static_router())
        .with_state(state)
        .layer(cors)
}

/// Bind `0.0.0.0:port` and serve the dashboard until the process exits.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Dashboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}
