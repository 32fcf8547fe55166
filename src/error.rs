//! Error types for the dashboard library.

use crate::rpc::RpcFailure;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("{0}")]
    Rpc(#[from] RpcFailure),
    #[error("not connected to a Bitcoin node")]
    NotConnected,
    #[error("invalid bitcoin address: {0}")]
    InvalidAddress(String),
    #[error("config: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for DashboardError {
    fn from(e: tokio::task::JoinError) -> Self { DashboardError::Task(e.to_string()) }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
