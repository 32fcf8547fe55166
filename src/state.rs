//! DashboardState - display-ready view of the event stream
//!
//! Every field is a finished display string, so the CLI and HTTP surface can
//! render it without knowing RPC shapes.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::DisplayConfig;
use crate::events::DashboardEvent;
use crate::format;
use crate::model::{AddressBalance, BalanceStatus, BlockSummary};

const IDLE: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressView {
    pub address: String,
    pub balance: String,
    pub balance_usd: String,
    pub status: BalanceStatus,
    pub sync_status: String,
    pub performance: Option<String>,
    pub transactions: Vec<String>,
}

impl AddressView {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            balance: format::btc(bitcoin::Amount::ZERO),
            balance_usd: format::usd(0.0),
            status: BalanceStatus::Ok,
            sync_status: "Waiting for first scan".into(),
            performance: None,
            transactions: Vec::new(),
        }
    }

    fn apply_balance(&mut self, balance: &AddressBalance) {
        self.balance = format::btc(balance.balance);
        self.balance_usd = format::usd(balance.balance_usd);
        self.status = balance.status;
        self.sync_status = match balance.status {
            BalanceStatus::Ok => format!("Synced ({} UTXOs)", balance.utxo_count),
            BalanceStatus::NodeBusy => "Node busy - showing last known balance".into(),
            BalanceStatus::Offline => "Offline - showing last known balance".into(),
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardState {
    pub connection: String,
    pub connected: bool,
    pub chain: String,
    pub blocks: String,
    pub headers: String,
    pub best_block_hash: String,
    pub difficulty: String,
    pub verification_progress: u8,
    pub disk_size: String,
    pub version: String,
    pub protocol_version: String,
    pub connections: String,
    pub network_active: String,
    pub mempool_size: String,
    pub mempool_bytes: String,
    pub recent_blocks: VecDeque<String>,
    pub peers: Vec<String>,
    pub status: Option<String>,
    pub last_error: Option<String>,
    pub addresses: BTreeMap<String, AddressView>,
    #[serde(skip)]
    block_hashes: VecDeque<String>,
    #[serde(skip)]
    max_recent_blocks: usize,
}

impl Default for DashboardState {
    fn default() -> Self { Self::new(&DisplayConfig::default()) }
}

impl DashboardState {
    pub fn new(display: &DisplayConfig) -> Self {
        let mut state = Self {
            connection: String::new(),
            connected: false,
            chain: String::new(),
            blocks: String::new(),
            headers: String::new(),
            best_block_hash: String::new(),
            difficulty: String::new(),
            verification_progress: 0,
            disk_size: String::new(),
            version: String::new(),
            protocol_version: String::new(),
            connections: String::new(),
            network_active: String::new(),
            mempool_size: String::new(),
            mempool_bytes: String::new(),
            recent_blocks: VecDeque::new(),
            peers: Vec::new(),
            status: None,
            last_error: None,
            addresses: BTreeMap::new(),
            block_hashes: VecDeque::new(),
            max_recent_blocks: display.max_recent_blocks.max(1),
        };
        state.reset_node_fields();
        state
    }

    fn reset_node_fields(&mut self) {
        self.connection = "Disconnected".into();
        self.connected = false;
        for field in [
            &mut self.chain,
            &mut self.blocks,
            &mut self.headers,
            &mut self.best_block_hash,
            &mut self.difficulty,
            &mut self.disk_size,
            &mut self.version,
            &mut self.protocol_version,
            &mut self.connections,
            &mut self.network_active,
            &mut self.mempool_size,
            &mut self.mempool_bytes,
        ] {
            *field = IDLE.to_string();
        }
        self.verification_progress = 0;
        self.peers.clear();
    }

    fn address_view(&mut self, address: &str) -> &mut AddressView {
        self.addresses.entry(address.to_string()).or_insert_with(|| AddressView::new(address))
    }

    pub fn track_address(&mut self, address: &str) { self.address_view(address); }

    pub fn untrack_address(&mut self, address: &str) { self.addresses.remove(address); }

    fn push_block(&mut self, block: &BlockSummary) {
        if self.block_hashes.contains(&block.hash) {
            return;
        }
        self.block_hashes.push_front(block.hash.clone());
        self.recent_blocks.push_front(format::block_line(block));
        self.block_hashes.truncate(self.max_recent_blocks);
        self.recent_blocks.truncate(self.max_recent_blocks);
    }

    pub fn apply(&mut self, event: &DashboardEvent) {
        match event {
            DashboardEvent::ConnectionChanged(true) => {
                self.connected = true;
                self.connection = "Connected".into();
                self.last_error = None;
            }
            DashboardEvent::ConnectionChanged(false) => self.reset_node_fields(),
            DashboardEvent::BlockchainInfo(info) => {
                self.chain = info.chain.clone();
                self.blocks = format::thousands(info.blocks);
                self.headers = format::thousands(info.headers);
                self.best_block_hash = info.bestblockhash.clone();
                self.difficulty = format::difficulty(info.difficulty);
                self.verification_progress = format::progress_percent(info.verificationprogress);
                self.disk_size = format::disk_size(info.size_on_disk);
            }
            DashboardEvent::NetworkInfo(info) => {
                self.version = if info.subversion.is_empty() { info.version.to_string() } else { info.subversion.clone() };
                self.protocol_version = info.protocolversion.to_string();
                self.connections = info.connections.to_string();
                self.network_active = if info.networkactive { "Yes" } else { "No" }.into();
            }
            DashboardEvent::MempoolInfo(info) => {
                self.mempool_size = format::mempool_size(info.size);
                self.mempool_bytes = format::mempool_bytes(info.bytes);
            }
            DashboardEvent::Peers(peers) => self.peers = peers.iter().map(format::peer_line).collect(),
            DashboardEvent::NewBlock(block) => self.push_block(block),
            DashboardEvent::AddressBalance(balance) => self.address_view(&balance.address).apply_balance(balance),
            DashboardEvent::AddressTransactions { address, transactions } => {
                self.address_view(address).transactions = transactions.iter().map(format::transaction_line).collect();
            }
            DashboardEvent::PerformanceStatus { address, message } => {
                self.address_view(address).performance = message.clone();
            }
            DashboardEvent::Status(message) => self.status = Some(message.clone()),
            DashboardEvent::Error(message) => self.last_error = Some(message.clone()),
        }
    }

    /// Apply events from `events` until shutdown or the sender closes.
    pub fn follow(
        state: Arc<RwLock<DashboardState>>,
        mut events: broadcast::Receiver<DashboardEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    event = events.recv() => match event {
                        Ok(event) => state.write().await.apply(&event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "state sink lagged behind events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}
