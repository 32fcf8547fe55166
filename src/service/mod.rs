//! BitcoinService - connection lifecycle, polling and address monitoring
//!
//! ```text
//! BitcoinService
//!     │
//!     ├── guarded_call ──► spawn_blocking ──► NodeRpc::call
//!     │       ├── TimeoutLadder      (escalate on timeout, relax on success)
//!     │       └── FailureTracker     (disconnect after a long failure run)
//!     │
//!     ├── SlowAddressTracker         (which addresses to scan this cycle)
//!     └── broadcast<DashboardEvent>  (state sink, CLI, HTTP)
//! ```
//!
//! All shared state sits behind one `std::sync::Mutex` that is never held
//! across an `.await`.

mod monitor;
mod wallet;

use bitcoin::{Amount, Network};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::backoff::{FailureTracker, FailureVerdict, TimeoutLadder};
use crate::config::{DashboardConfig, DisplayConfig, PollConfig};
use crate::error::{DashboardError, DashboardResult};
use crate::events::DashboardEvent;
use crate::format;
use crate::model::{
    self, AddressBalance, AddressTransaction, BalanceStatus, BlockSummary, BlockchainInfo, MempoolInfo, NetworkInfo,
    PeerInfo, ScanResult, Utxo, WalletInfo,
};
use crate::rpc::{methods, CoreRpc, NodeRpc, RpcFailure, CODE_WALLET_NOT_FOUND};
use crate::throttle::SlowAddressTracker;

const EVENT_CAPACITY: usize = 256;
const LISTUNSPENT_MAX_CONF: u64 = 9_999_999;
const LIST_TRANSACTIONS_COUNT: u64 = 100;
/// `RPC_WALLET_NOT_SPECIFIED`: several wallets loaded, none selected
const CODE_WALLET_NOT_SPECIFIED: i32 = -19;

/// Wallet flavour detected at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletMode {
    /// No wallet loaded: balances come from UTXO set scans
    #[default]
    None,
    /// Legacy wallet: watch-only import, `listunspent`
    Legacy,
    /// Descriptor wallet: `scantxoutset`
    Descriptor,
}

impl WalletMode {
    fn uses_scan(&self) -> bool { !matches!(self, WalletMode::Legacy) }
}

/// Outcome of [`BitcoinService::refresh`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RefreshReport {
    /// Addresses whose balance was refreshed
    pub refreshed: usize,
    /// First node-poll failure, if any
    pub poll_error: Option<String>,
}

struct Inner {
    connected: bool,
    no_node_mode: bool,
    node_busy: bool,
    wallet: WalletMode,
    network: Option<Network>,
    ladder: TimeoutLadder,
    failures: FailureTracker,
    slow: SlowAddressTracker,
    addresses: BTreeSet<String>,
    balances: HashMap<String, AddressBalance>,
    transactions: HashMap<String, Vec<AddressTransaction>>,
    scans: HashMap<String, ScanResult>,
    best_block: Option<String>,
    last_connect_attempt: Option<Instant>,
}

pub struct BitcoinService {
    rpc: Arc<dyn NodeRpc>,
    poll: PollConfig,
    display: DisplayConfig,
    inner: Mutex<Inner>,
    events: broadcast::Sender<DashboardEvent>,
}

impl BitcoinService {
    /// Service talking to the node described by `config.rpc`.
    pub fn new(config: &DashboardConfig) -> Arc<Self> {
        Self::with_rpc(Arc::new(CoreRpc::new(&config.rpc)), config)
    }

    pub fn with_rpc(rpc: Arc<dyn NodeRpc>, config: &DashboardConfig) -> Arc<Self> {
        let poll = config.poll();
        let mut addresses = BTreeSet::new();
        for address in &config.addresses {
            match model::parse_address(address) {
                Ok(_) => {
                    addresses.insert(address.trim().to_string());
                }
                Err(_) => tracing::warn!(%address, "skipping invalid configured address"),
            }
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            inner: Mutex::new(Inner {
                connected: false,
                no_node_mode: false,
                node_busy: false,
                wallet: WalletMode::None,
                network: None,
                ladder: TimeoutLadder::from_config(&poll),
                failures: FailureTracker::new(poll.failure_threshold),
                slow: SlowAddressTracker::from_config(&poll),
                addresses,
                balances: HashMap::new(),
                transactions: HashMap::new(),
                scans: HashMap::new(),
                best_block: None,
                last_connect_attempt: None,
            }),
            rpc,
            poll,
            display: config.display.clone(),
            events,
        })
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: DashboardEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> { self.events.subscribe() }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn poll_config(&self) -> &PollConfig { &self.poll }
    pub fn display_config(&self) -> &DisplayConfig { &self.display }
    pub fn endpoint(&self) -> String { self.rpc.endpoint() }
    pub fn is_connected(&self) -> bool { self.inner().connected }
    pub fn is_no_node_mode(&self) -> bool { self.inner().no_node_mode }
    pub fn is_node_busy(&self) -> bool { self.inner().node_busy }
    pub fn is_descriptor_wallet(&self) -> bool { self.inner().wallet == WalletMode::Descriptor }
    pub fn wallet_mode(&self) -> WalletMode { self.inner().wallet }
    pub fn network(&self) -> Option<Network> { self.inner().network }
    pub fn failure_count(&self) -> u32 { self.inner().failures.consecutive() }
    pub fn current_timeout(&self) -> Duration { self.inner().ladder.current() }
    pub fn best_block_hash(&self) -> Option<String> { self.inner().best_block.clone() }
    pub fn is_slow_address(&self, address: &str) -> bool { self.inner().slow.is_slow(address) }
    pub fn monitored_addresses(&self) -> Vec<String> { self.inner().addresses.iter().cloned().collect() }
    pub fn address_balance(&self, address: &str) -> Option<AddressBalance> { self.inner().balances.get(address).cloned() }

    pub fn address_transactions(&self, address: &str) -> Vec<AddressTransaction> {
        self.inner().transactions.get(address).cloned().unwrap_or_default()
    }

    /// Configured USD per BTC; no price feed is queried.
    pub fn btc_price_estimate(&self) -> f64 { self.display.btc_price_usd }

    // ------------------------------------------------------------------
    // Call paths
    // ------------------------------------------------------------------

    /// One RPC on the blocking pool, no bookkeeping.
    async fn raw_call(&self, method: &str, params: Vec<Value>, timeout: Duration) -> Result<Value, RpcFailure> {
        let rpc = self.rpc.clone();
        let method_name = method.to_string();
        tokio::task::spawn_blocking(move || rpc.call(&method_name, &params, timeout))
            .await
            .map_err(|e| RpcFailure::Transport(format!("rpc task for {} failed: {}", method, e)))?
    }

    /// RPC with the current ladder timeout and failure accounting.
    async fn guarded_call(&self, method: &str, params: Vec<Value>) -> DashboardResult<Value> {
        let timeout = self.current_timeout();
        self.guarded_call_with(method, params, timeout).await
    }

    async fn guarded_call_with(&self, method: &str, params: Vec<Value>, timeout: Duration) -> DashboardResult<Value> {
        if !self.is_connected() {
            return Err(DashboardError::NotConnected);
        }
        match self.raw_call(method, params, timeout).await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(failure) => {
                self.record_failure(method, &failure);
                Err(failure.into())
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner();
        inner.failures.record_success();
        inner.ladder.relax();
        inner.node_busy = false;
    }

    fn record_failure(&self, method: &str, failure: &RpcFailure) {
        let mut status = None;
        let mut dropped = false;
        {
            let mut inner = self.inner();
            if failure.wants_longer_timeout() {
                let next = inner.ladder.escalate();
                inner.node_busy = true;
                status = Some(format!("Node busy, retrying with {}s timeout", next.as_secs()));
            } else if failure.is_transient() {
                inner.node_busy = true;
            }
            let verdict = inner.failures.record_failure();
            tracing::warn!(
                method,
                error = %failure,
                consecutive = inner.failures.consecutive(),
                threshold = inner.failures.threshold(),
                "rpc call failed"
            );
            if verdict == FailureVerdict::Disconnect && inner.connected {
                inner.connected = false;
                inner.node_busy = false;
                inner.ladder.reset();
                dropped = true;
            }
        }
        if let Some(status) = status {
            self.emit(DashboardEvent::Status(status));
        }
        if dropped {
            let threshold = self.poll.failure_threshold;
            tracing::error!(threshold, "too many consecutive rpc failures, disconnecting");
            self.emit(DashboardEvent::ConnectionChanged(false));
            self.emit(DashboardEvent::Status(format!(
                "Disconnected after {} consecutive RPC failures",
                threshold
            )));
        }
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Probe the node with `getblockchaininfo`, retrying busy conditions.
    pub async fn connect_to_node(&self) -> DashboardResult<BlockchainInfo> {
        self.inner().last_connect_attempt = Some(Instant::now());
        let attempts = self.poll.max_retries.max(1);
        let mut ladder = TimeoutLadder::from_config(&self.poll);
        let mut last_failure = RpcFailure::Transport("no connection attempt made".into());

        for attempt in 1..=attempts {
            match self.raw_call(methods::GET_BLOCKCHAIN_INFO, vec![], ladder.current()).await {
                Ok(value) => return self.on_connected(value).await,
                Err(failure) if failure.is_fatal_for_connect() => {
                    tracing::error!(endpoint = %self.rpc.endpoint(), error = %failure, "cannot connect to node");
                    last_failure = failure;
                    break;
                }
                Err(failure) => {
                    tracing::warn!(attempt, attempts, timeout_secs = ladder.current().as_secs(), error = %failure, "connect attempt failed");
                    if failure.wants_longer_timeout() {
                        ladder.escalate();
                    }
                    last_failure = failure;
                    if attempt < attempts {
                        tokio::time::sleep(self.poll.retry_delay()).await;
                    }
                }
            }
        }

        self.enter_no_node_mode();
        self.emit(DashboardEvent::Error(last_failure.user_message()));
        Err(last_failure.into())
    }

    async fn on_connected(&self, value: Value) -> DashboardResult<BlockchainInfo> {
        let info: BlockchainInfo = model::from_value(value)?;
        {
            let mut inner = self.inner();
            inner.connected = true;
            inner.no_node_mode = false;
            inner.node_busy = false;
            inner.network = info.network();
            inner.failures.record_success();
            inner.ladder.reset();
        }
        let wallet = self.detect_wallet().await;
        self.inner().wallet = wallet;
        tracing::info!(
            endpoint = %self.rpc.endpoint(),
            chain = %info.chain,
            blocks = info.blocks,
            wallet = ?wallet,
            "connected to bitcoin node"
        );

        self.emit(DashboardEvent::ConnectionChanged(true));
        self.emit(DashboardEvent::BlockchainInfo(info.clone()));
        self.emit(DashboardEvent::Status(format!("Connected to Bitcoin Core ({})", info.chain)));

        if wallet == WalletMode::Legacy {
            for address in self.monitored_addresses() {
                self.import_address(&address).await;
            }
        }
        Ok(info)
    }

    async fn detect_wallet(&self) -> WalletMode {
        match self.raw_call(methods::GET_WALLET_INFO, vec![], self.poll.connection_timeout()).await {
            Ok(value) => match model::from_value::<WalletInfo>(value) {
                Ok(info) if info.descriptors => WalletMode::Descriptor,
                Ok(_) => WalletMode::Legacy,
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable getwalletinfo, assuming no wallet");
                    WalletMode::None
                }
            },
            Err(RpcFailure::Node { code, .. }) if code == CODE_WALLET_NOT_FOUND || code == CODE_WALLET_NOT_SPECIFIED => {
                tracing::info!(code, "no wallet loaded, balances will use UTXO set scans");
                WalletMode::None
            }
            Err(e) => {
                tracing::warn!(error = %e, "wallet detection failed, assuming no wallet");
                WalletMode::None
            }
        }
    }

    fn enter_no_node_mode(&self) {
        let was_connected = {
            let mut inner = self.inner();
            let was = inner.connected;
            inner.connected = false;
            inner.no_node_mode = true;
            inner.node_busy = false;
            was
        };
        tracing::warn!("no bitcoin node available, continuing in no-node mode");
        if was_connected {
            self.emit(DashboardEvent::ConnectionChanged(false));
        }
        self.emit(DashboardEvent::Status("No Bitcoin node - addresses stay tracked offline".into()));
    }

    pub fn disconnect(&self) {
        let was_connected = std::mem::replace(&mut self.inner().connected, false);
        if was_connected {
            tracing::info!("disconnected from bitcoin node");
            self.emit(DashboardEvent::ConnectionChanged(false));
        }
    }

    /// Whether the monitor should try to reconnect now.
    pub(crate) fn reconnect_due(&self, now: Instant) -> bool {
        let inner = self.inner();
        !inner.connected
            && inner
                .last_connect_attempt
                .map(|last| now.saturating_duration_since(last) >= self.poll.reconnect_interval())
                .unwrap_or(true)
    }

    // ------------------------------------------------------------------
    // Node polling
    // ------------------------------------------------------------------

    /// Chain, network, mempool and peer snapshot.
    pub async fn update_data(&self) -> DashboardResult<()> {
        let chain: BlockchainInfo = model::from_value(self.guarded_call(methods::GET_BLOCKCHAIN_INFO, vec![]).await?)?;
        self.inner().network = chain.network();
        self.emit(DashboardEvent::BlockchainInfo(chain));

        let network: NetworkInfo = model::from_value(self.guarded_call(methods::GET_NETWORK_INFO, vec![]).await?)?;
        self.emit(DashboardEvent::NetworkInfo(network));

        let mempool: MempoolInfo = model::from_value(self.guarded_call(methods::GET_MEMPOOL_INFO, vec![]).await?)?;
        self.emit(DashboardEvent::MempoolInfo(mempool));

        let mut peers: Vec<PeerInfo> = model::from_value(self.guarded_call(methods::GET_PEER_INFO, vec![]).await?)?;
        peers.truncate(self.display.max_peers_display);
        self.emit(DashboardEvent::Peers(peers));
        Ok(())
    }

    /// Emit `NewBlock` when the tip moved since the last call.
    pub async fn check_new_block(&self) -> DashboardResult<Option<BlockSummary>> {
        let value = self.guarded_call_with(methods::GET_BEST_BLOCK_HASH, vec![], self.poll.base_timeout()).await?;
        let hash: String = model::from_value(value)?;
        let previous = self.inner().best_block.clone();
        match previous {
            None => {
                self.inner().best_block = Some(hash);
                Ok(None)
            }
            Some(prev) if prev == hash => Ok(None),
            Some(_) => {
                // Recorded only after getblock succeeds; a failed fetch retries next tick
                let block = self.get_block_by_hash(&hash).await?;
                self.inner().best_block = Some(hash);
                tracing::info!(height = block.height, hash = %format::short_hash(&block.hash), "new block");
                self.emit(DashboardEvent::NewBlock(block.clone()));
                Ok(Some(block))
            }
        }
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> DashboardResult<BlockSummary> {
        let value = self.guarded_call(methods::GET_BLOCK, vec![json!(hash), json!(1)]).await?;
        Ok(BlockSummary::from_block(value)?)
    }

    /// Decoded transaction (`getrawtransaction <txid> true`).
    pub async fn get_transaction(&self, txid: &str) -> DashboardResult<Value> {
        self.guarded_call(methods::GET_RAW_TRANSACTION, vec![json!(txid), json!(true)]).await
    }

    /// Arbitrary RPC pass-through.
    pub async fn send_raw_command(&self, method: &str, params: Vec<Value>) -> DashboardResult<Value> {
        self.guarded_call(method, params).await
    }

    /// `update_data` followed by one address cycle.
    ///
    /// A failing poll method does not skip the address cycle; its error is
    /// reported alongside the count. Errors with `NotConnected` when offline.
    pub async fn refresh(&self) -> DashboardResult<RefreshReport> {
        if !self.is_connected() {
            return Err(DashboardError::NotConnected);
        }
        let poll_error = self.update_data().await.err().map(|e| {
            tracing::debug!(error = %e, "node poll failed during refresh");
            e.to_string()
        });
        let refreshed = self.update_all_monitored_addresses().await;
        Ok(RefreshReport { refreshed, poll_error })
    }

    // ------------------------------------------------------------------
    // Address monitoring
    // ------------------------------------------------------------------

    /// Start tracking `address`. Returns false when it was already tracked.
    pub async fn add_address_to_monitor(&self, address: &str) -> DashboardResult<bool> {
        let address = address.trim();
        model::parse_address(address)?;
        let (inserted, network, wallet, connected) = {
            let mut inner = self.inner();
            if !model::address_matches_network(address, inner.network) {
                return Err(DashboardError::InvalidAddress(format!(
                    "{} is not valid for {}",
                    address,
                    inner.network.map(|n| n.to_string()).unwrap_or_default()
                )));
            }
            (inner.addresses.insert(address.to_string()), inner.network, inner.wallet, inner.connected)
        };
        if !inserted {
            return Ok(false);
        }
        tracing::info!(%address, ?network, "monitoring address");
        if connected && wallet == WalletMode::Legacy {
            self.import_address(address).await;
        }
        self.emit(DashboardEvent::Status(format!("Monitoring {}", format::short_hash(address))));
        Ok(true)
    }

    /// Watch-only import into a legacy wallet, without rescan.
    async fn import_address(&self, address: &str) {
        let label = format!("alpha_{}", address.chars().take(8).collect::<String>());
        match self
            .guarded_call(methods::IMPORT_ADDRESS, vec![json!(address), json!(label), json!(false)])
            .await
        {
            Ok(_) => tracing::debug!(%address, "imported watch-only address"),
            Err(DashboardError::Rpc(failure)) if failure.is_already_done() => {
                tracing::debug!(%address, "address already in wallet")
            }
            Err(e) => tracing::warn!(%address, error = %e, "importaddress failed, balance may lag"),
        }
    }

    pub fn remove_address_from_monitor(&self, address: &str) -> bool {
        let mut inner = self.inner();
        let removed = inner.addresses.remove(address);
        inner.balances.remove(address);
        inner.transactions.remove(address);
        inner.scans.remove(address);
        inner.slow.forget(address);
        drop(inner);
        if removed {
            tracing::info!(%address, "stopped monitoring address");
        }
        removed
    }

    fn last_known(&self, address: &str) -> AddressBalance {
        self.address_balance(address)
            .unwrap_or_else(|| AddressBalance::new(address, Amount::ZERO, 0, self.display.btc_price_usd))
    }

    /// Balance via `scantxoutset` (descriptor or no wallet) or `listunspent` (legacy).
    pub async fn update_address_balance(&self, address: &str) -> DashboardResult<AddressBalance> {
        let (connected, wallet) = {
            let inner = self.inner();
            (inner.connected, inner.wallet)
        };
        if !connected {
            let offline = self.last_known(address).with_status(BalanceStatus::Offline);
            self.emit(DashboardEvent::AddressBalance(offline.clone()));
            return Ok(offline);
        }

        let started = Instant::now();
        let result = if wallet.uses_scan() { self.scan_balance(address).await } else { self.unspent_balance(address).await };
        let elapsed = started.elapsed();

        match result {
            Ok(balance) => {
                self.note_scan_time(address, elapsed);
                self.inner().balances.insert(address.to_string(), balance.clone());
                tracing::debug!(%address, sats = balance.balance.to_sat(), utxos = balance.utxo_count, elapsed_ms = elapsed.as_millis() as u64, "balance updated");
                self.emit(DashboardEvent::AddressBalance(balance.clone()));
                Ok(balance)
            }
            Err(DashboardError::Rpc(failure)) if matches!(failure, RpcFailure::Timeout(_) | RpcFailure::ScanInProgress) => {
                if matches!(failure, RpcFailure::Timeout(_)) {
                    // A timed-out scan counts as slow regardless of the measured time
                    self.note_scan_time(address, elapsed.max(self.poll.slow_scan_threshold() + Duration::from_millis(1)));
                }
                let busy = self.last_known(address).with_status(BalanceStatus::NodeBusy);
                tracing::info!(%address, error = %failure, "node busy, keeping last known balance");
                self.emit(DashboardEvent::AddressBalance(busy.clone()));
                Ok(busy)
            }
            Err(e) => Err(e),
        }
    }

    fn note_scan_time(&self, address: &str, elapsed: Duration) {
        let (flipped, slow, retry) = {
            let mut inner = self.inner();
            let flipped = inner.slow.record_scan(address, elapsed, Instant::now());
            (flipped, inner.slow.is_slow(address), inner.slow.retry_interval())
        };
        if !flipped {
            return;
        }
        let message = slow.then(|| {
            format!("Slow scan ({}s) - checking every {} min", elapsed.as_secs(), retry.as_secs() / 60)
        });
        tracing::info!(%address, slow, elapsed_secs = elapsed.as_secs(), "address scan speed changed");
        self.emit(DashboardEvent::PerformanceStatus { address: address.to_string(), message });
    }

    async fn scan_balance(&self, address: &str) -> DashboardResult<AddressBalance> {
        let descriptor = format!("addr({})", address);
        let value = self.guarded_call(methods::SCAN_TX_OUT_SET, vec![json!("start"), json!([descriptor])]).await?;
        let scan: ScanResult = model::from_value(value)?;
        if !scan.success {
            return Err(RpcFailure::Decode("scantxoutset reported failure".into()).into());
        }
        let balance = AddressBalance::new(address, scan.total(), scan.unspents.len(), self.display.btc_price_usd);
        self.inner().scans.insert(address.to_string(), scan);
        Ok(balance)
    }

    async fn unspent_balance(&self, address: &str) -> DashboardResult<AddressBalance> {
        let utxos = self.list_unspent(&[address.to_string()]).await?;
        let total = Amount::from_sat(utxos.iter().map(|u| u.amount.to_sat()).sum());
        Ok(AddressBalance::new(address, total, utxos.len(), self.display.btc_price_usd))
    }

    pub(crate) async fn list_unspent(&self, addresses: &[String]) -> DashboardResult<Vec<Utxo>> {
        let value = self
            .guarded_call(methods::LIST_UNSPENT, vec![json!(0), json!(LISTUNSPENT_MAX_CONF), json!(addresses)])
            .await?;
        let entries: Vec<Value> = model::from_value(value)?;
        let utxos = entries.into_iter().map(Utxo::from_listunspent).collect::<Result<Vec<_>, RpcFailure>>()?;
        Ok(utxos)
    }

    fn scanned_transactions(&self, address: &str) -> Vec<AddressTransaction> {
        let inner = self.inner();
        inner.scans.get(address).map(ScanResult::received_transactions).unwrap_or_default()
    }

    /// Recent transactions touching `address`.
    pub async fn update_address_transactions(&self, address: &str) -> DashboardResult<Vec<AddressTransaction>> {
        let wallet = self.wallet_mode();
        let transactions = if wallet.uses_scan() {
            self.scanned_transactions(address)
        } else {
            let value = self
                .guarded_call(
                    methods::LIST_TRANSACTIONS,
                    vec![json!("*"), json!(LIST_TRANSACTIONS_COUNT), json!(0), json!(true)],
                )
                .await?;
            let entries: Vec<Value> = model::from_value(value)?;
            AddressTransaction::from_listtransactions(entries, address)
        };
        self.inner().transactions.insert(address.to_string(), transactions.clone());
        self.emit(DashboardEvent::AddressTransactions { address: address.to_string(), transactions: transactions.clone() });
        Ok(transactions)
    }

    /// Balance and transactions for the addresses scheduled this cycle.
    /// Returns how many addresses were refreshed.
    pub async fn update_all_monitored_addresses(&self) -> usize {
        let planned = {
            let mut inner = self.inner();
            let addresses: Vec<String> = inner.addresses.iter().cloned().collect();
            inner.slow.plan_cycle(&addresses, Instant::now())
        };
        let mut refreshed = 0;
        for address in planned {
            if !self.is_connected() {
                break;
            }
            match self.update_address_balance(&address).await {
                Ok(balance) if balance.status == BalanceStatus::Ok => {
                    if let Err(e) = self.update_address_transactions(&address).await {
                        tracing::warn!(%address, error = %e, "transaction refresh failed");
                    }
                    refreshed += 1;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(%address, error = %e, "balance refresh failed"),
            }
        }
        refreshed
    }
}
