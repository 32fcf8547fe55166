//! Events broadcast by `BitcoinService`.

use serde::Serialize;

use crate::model::{
    AddressBalance, AddressTransaction, BlockSummary, BlockchainInfo, MempoolInfo, NetworkInfo, PeerInfo,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DashboardEvent {
    ConnectionChanged(bool),
    BlockchainInfo(BlockchainInfo),
    NetworkInfo(NetworkInfo),
    MempoolInfo(MempoolInfo),
    Peers(Vec<PeerInfo>),
    NewBlock(BlockSummary),
    AddressBalance(AddressBalance),
    AddressTransactions { address: String, transactions: Vec<AddressTransaction> },
    /// `None` clears the note once the address scans quickly again
    PerformanceStatus { address: String, message: Option<String> },
    Status(String),
    Error(String),
}

impl DashboardEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardEvent::ConnectionChanged(_) => "connection_changed",
            DashboardEvent::BlockchainInfo(_) => "blockchain_info",
            DashboardEvent::NetworkInfo(_) => "network_info",
            DashboardEvent::MempoolInfo(_) => "mempool_info",
            DashboardEvent::Peers(_) => "peers",
            DashboardEvent::NewBlock(_) => "new_block",
            DashboardEvent::AddressBalance(_) => "address_balance",
            DashboardEvent::AddressTransactions { .. } => "address_transactions",
            DashboardEvent::PerformanceStatus { .. } => "performance_status",
            DashboardEvent::Status(_) => "status",
            DashboardEvent::Error(_) => "error",
        }
    }
}
