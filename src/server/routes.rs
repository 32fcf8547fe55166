//! HTTP routes over the dashboard state and address list

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::DashboardError;
use crate::model::AddressBalance;
use crate::service::{BitcoinService, RefreshReport};
use crate::state::DashboardState;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BitcoinService>,
    pub state: Arc<RwLock<DashboardState>>,
    pub app_name: String,
}

impl AppState {
    pub fn new(service: Arc<BitcoinService>, state: Arc<RwLock<DashboardState>>, app_name: impl Into<String>) -> Self {
        Self { service, state, app_name: app_name.into() }
    }
}

#[derive(Deserialize)]
pub struct AddAddressRequest { address: String }

#[derive(Serialize)]
pub struct AddressEntry { address: String, balance: Option<AddressBalance>, slow: bool }

#[derive(Serialize)]
pub struct AddressListResponse { addresses: Vec<AddressEntry>, count: usize }

#[derive(Serialize)]
pub struct AddAddressResponse { address: String, added: bool }

type ApiError = (StatusCode, String);

fn api_error(e: DashboardError) -> ApiError {
    let code = match &e {
        DashboardError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        DashboardError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        DashboardError::Rpc(f) if f.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        DashboardError::Rpc(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, e.to_string())
}

pub fn create_router(service: Arc<BitcoinService>, state: Arc<RwLock<DashboardState>>) -> Router {
    create_router_with_name(AppState::new(service, state, "alpha-dashboard"))
}

pub fn create_router_with_name(app: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/addresses", get(list_addresses).post(add_address))
        .route("/addresses/:address", delete(remove_address))
        .route("/refresh", post(refresh))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn health(State(s): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": s.app_name,
        "connected": s.service.is_connected(),
        "no_node_mode": s.service.is_no_node_mode(),
        "node_busy": s.service.is_node_busy(),
    }))
}

async fn status(State(s): State<AppState>) -> Json<DashboardState> {
    Json(s.state.read().await.clone())
}

async fn list_addresses(State(s): State<AppState>) -> Json<AddressListResponse> {
    let addresses: Vec<AddressEntry> = s
        .service
        .monitored_addresses()
        .into_iter()
        .map(|address| AddressEntry {
            balance: s.service.address_balance(&address),
            slow: s.service.is_slow_address(&address),
            address,
        })
        .collect();
    Json(AddressListResponse { count: addresses.len(), addresses })
}

async fn add_address(State(s): State<AppState>, Json(payload): Json<AddAddressRequest>) -> Result<Json<AddAddressResponse>, ApiError> {
    let address = payload.address.trim().to_string();
    let added = s.service.add_address_to_monitor(&address).await.map_err(api_error)?;
    s.state.write().await.track_address(&address);
    Ok(Json(AddAddressResponse { address, added }))
}

async fn remove_address(State(s): State<AppState>, Path(address): Path<String>) -> Result<StatusCode, ApiError> {
    if !s.service.remove_address_from_monitor(&address) {
        return Err((StatusCode::NOT_FOUND, format!("not monitored: {}", address)));
    }
    s.state.write().await.untrack_address(&address);
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh(State(s): State<AppState>) -> Result<Json<RefreshReport>, ApiError> {
    s.service.refresh().await.map(Json).map_err(api_error)
}
