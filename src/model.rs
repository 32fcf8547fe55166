//! Model - typed views of Bitcoin Core RPC responses
//!
//! Parsing is lenient: missing fields default and unknown fields are
//! ignored, so a field added or dropped between node releases never fails a
//! poll cycle. BTC amounts arrive as JSON floats and are converted to
//! satoshi `Amount`s at the boundary.

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, AddressType, Amount, Network};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DashboardError;
use crate::rpc::RpcFailure;

pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, RpcFailure> {
    serde_json::from_value(value).map_err(|e| RpcFailure::Decode(e.to_string()))
}

/// BTC float to satoshis, rounded; sign is dropped (direction is tracked separately).
pub fn btc_to_amount(btc: f64) -> Amount {
    if !btc.is_finite() {
        return Amount::ZERO;
    }
    Amount::from_sat((btc.abs() * 100_000_000.0).round() as u64)
}

// =============================================================================
// Node status
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    pub bestblockhash: String,
    pub difficulty: f64,
    pub verificationprogress: f64,
    pub size_on_disk: u64,
    pub initialblockdownload: bool,
    pub pruned: bool,
}

impl BlockchainInfo {
    pub fn network(&self) -> Option<Network> { Network::from_core_arg(&self.chain).ok() }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInfo {
    pub version: u64,
    pub subversion: String,
    pub protocolversion: u64,
    pub connections: u64,
    pub networkactive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolInfo {
    pub size: u64,
    pub bytes: u64,
    pub usage: u64,
    pub mempoolminfee: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerInfo {
    pub id: u64,
    pub addr: String,
    pub version: u64,
    pub subver: String,
    pub conntime: i64,
    pub inbound: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub hash: String,
    pub height: u64,
    pub time: i64,
    pub tx_count: usize,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawBlock {
    hash: String,
    height: u64,
    time: i64,
    #[serde(rename = "nTx")]
    n_tx: Option<usize>,
    tx: Vec<Value>,
}

impl BlockSummary {
    /// From `getblock <hash> 1` (or 2).
    pub fn from_block(value: Value) -> Result<Self, RpcFailure> {
        let raw: RawBlock = from_value(value)?;
        Ok(Self { tx_count: raw.n_tx.unwrap_or(raw.tx.len()), hash: raw.hash, height: raw.height, time: raw.time })
    }
}

// =============================================================================
// Wallet
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletInfo {
    pub walletname: String,
    pub walletversion: u64,
    pub balance: f64,
    pub unconfirmed_balance: f64,
    pub immature_balance: f64,
    pub keypoolsize: u64,
    pub descriptors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorEntry {
    pub desc: String,
    pub active: bool,
    pub internal: Option<bool>,
    pub timestamp: i64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(crate) struct DescriptorList {
    pub descriptors: Vec<DescriptorEntry>,
}

/// Address type for `getnewaddress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressKind {
    Legacy,
    P2shSegwit,
    Bech32,
    Bech32m,
}

impl AddressKind {
    pub const ALL: [AddressKind; 4] = [AddressKind::Legacy, AddressKind::P2shSegwit, AddressKind::Bech32, AddressKind::Bech32m];

    pub fn as_rpc(&self) -> &'static str {
        match self {
            AddressKind::Legacy => "legacy",
            AddressKind::P2shSegwit => "p2sh-segwit",
            AddressKind::Bech32 => "bech32",
            AddressKind::Bech32m => "bech32m",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" | "p2pkh" => Some(AddressKind::Legacy),
            "p2sh-segwit" | "p2sh" => Some(AddressKind::P2shSegwit),
            "bech32" | "segwit" | "p2wpkh" => Some(AddressKind::Bech32),
            "bech32m" | "taproot" | "p2tr" => Some(AddressKind::Bech32m),
            _ => None,
        }
    }
}

impl std::str::FromStr for AddressKind {
    type Err = DashboardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AddressKind::from_str(value).ok_or_else(|| DashboardError::Config(format!("unknown address kind: {}", value)))
    }
}

/// Output script type of a parsed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    Other,
}

pub fn parse_address(address: &str) -> Result<Address<NetworkUnchecked>, DashboardError> {
    address
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|_| DashboardError::InvalidAddress(address.to_string()))
}

pub fn classify_address(address: &str) -> Option<ScriptKind> {
    let addr = parse_address(address).ok()?.assume_checked();
    Some(match addr.address_type() {
        Some(AddressType::P2pkh) => ScriptKind::P2pkh,
        Some(AddressType::P2sh) => ScriptKind::P2sh,
        Some(AddressType::P2wpkh) => ScriptKind::P2wpkh,
        Some(AddressType::P2wsh) => ScriptKind::P2wsh,
        Some(AddressType::P2tr) => ScriptKind::P2tr,
        _ => ScriptKind::Other,
    })
}

/// True when the address belongs to `network`, or the network is unknown.
pub fn address_matches_network(address: &str, network: Option<Network>) -> bool {
    match (parse_address(address), network) {
        (Ok(addr), Some(net)) => addr.is_valid_for_network(net),
        (Ok(_), None) => true,
        (Err(_), _) => false,
    }
}

// =============================================================================
// UTXOs, balances, transactions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub address: Option<String>,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,
    pub confirmations: u64,
    pub spendable: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawUnspent {
    txid: String,
    vout: u32,
    address: Option<String>,
    amount: f64,
    confirmations: u64,
    spendable: bool,
}

impl Utxo {
    /// From one `listunspent` entry.
    pub fn from_listunspent(value: Value) -> Result<Self, RpcFailure> {
        let raw: RawUnspent = from_value(value)?;
        Ok(Self {
            txid: raw.txid,
            vout: raw.vout,
            address: raw.address,
            amount: btc_to_amount(raw.amount),
            confirmations: raw.confirmations,
            spendable: raw.spendable,
        })
    }
}

/// `scantxoutset start` result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanResult {
    pub success: bool,
    /// Chain tip height the scan ran against
    pub height: u64,
    pub unspents: Vec<ScanUnspent>,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanUnspent {
    pub txid: String,
    pub vout: u32,
    /// Matching descriptor, e.g. `addr(bc1q...)#checksum`
    pub desc: String,
    pub amount: f64,
    pub height: u64,
    pub coinbase: bool,
}

impl ScanUnspent {
    /// Address inside an `addr(...)` descriptor.
    pub fn address(&self) -> Option<&str> {
        let inner = self.desc.strip_prefix("addr(")?;
        inner.find(')').map(|end| &inner[..end])
    }
}

impl ScanResult {
    pub fn total(&self) -> Amount { btc_to_amount(self.total_amount) }

    pub fn confirmations(&self, unspent: &ScanUnspent) -> u64 {
        if unspent.height == 0 || unspent.height > self.height { 0 } else { self.height - unspent.height + 1 }
    }

    pub fn utxos(&self) -> Vec<Utxo> {
        self.unspents
            .iter()
            .map(|u| Utxo {
                txid: u.txid.clone(),
                vout: u.vout,
                address: u.address().map(str::to_string),
                amount: btc_to_amount(u.amount),
                confirmations: self.confirmations(u),
                spendable: false,
            })
            .collect()
    }

    /// Each unspent as a received transaction; confirmations from the scan tip.
    pub fn received_transactions(&self) -> Vec<AddressTransaction> {
        let mut txs: Vec<AddressTransaction> = self
            .unspents
            .iter()
            .map(|u| AddressTransaction {
                txid: u.txid.clone(),
                direction: TxDirection::Received,
                amount: btc_to_amount(u.amount),
                confirmations: self.confirmations(u) as i64,
                time: 0,
            })
            .collect();
        txs.sort_by_key(|t| t.confirmations);
        txs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    #[default]
    Ok,
    /// Scan timed out or another scan is running; balance is the last known one
    NodeBusy,
    /// No connection; balance is the last known one
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub address: String,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub balance: Amount,
    pub balance_usd: f64,
    pub utxo_count: usize,
    pub status: BalanceStatus,
    /// Unix seconds
    pub checked_at: i64,
}

impl AddressBalance {
    pub fn new(address: impl Into<String>, balance: Amount, utxo_count: usize, btc_price_usd: f64) -> Self {
        Self {
            address: address.into(),
            balance,
            balance_usd: balance.to_btc() * btc_price_usd,
            utxo_count,
            status: BalanceStatus::Ok,
            checked_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_status(mut self, status: BalanceStatus) -> Self { self.status = status; self }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxDirection {
    Received,
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTransaction {
    pub txid: String,
    pub direction: TxDirection,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,
    /// Negative for conflicted transactions
    pub confirmations: i64,
    pub time: i64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawWalletTx {
    address: Option<String>,
    category: String,
    amount: f64,
    confirmations: i64,
    time: i64,
    txid: String,
}

impl AddressTransaction {
    /// Entries of `listtransactions` that touch `address`.
    pub fn from_listtransactions(entries: Vec<Value>, address: &str) -> Vec<Self> {
        let mut txs: Vec<Self> = entries
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawWalletTx>(v).ok())
            .filter(|raw| raw.address.as_deref() == Some(address))
            .map(|raw| Self {
                direction: if raw.category == "send" || raw.amount < 0.0 { TxDirection::Sent } else { TxDirection::Received },
                amount: btc_to_amount(raw.amount),
                confirmations: raw.confirmations,
                time: raw.time,
                txid: raw.txid,
            })
            .collect();
        txs.sort_by(|a, b| b.time.cmp(&a.time));
        txs
    }
}

/// `estimatesmartfee` result converted to sat/vB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub conf_target: u16,
    pub sat_per_vbyte: f64,
    pub blocks: u64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(crate) struct RawFeeEstimate {
    pub feerate: Option<f64>,
    pub blocks: u64,
    pub errors: Vec<String>,
}

impl FeeEstimate {
    pub(crate) fn from_raw(conf_target: u16, raw: RawFeeEstimate) -> Result<Self, RpcFailure> {
        let feerate = raw.feerate.ok_or_else(|| {
            RpcFailure::Decode(raw.errors.first().cloned().unwrap_or_else(|| "no fee estimate available".into()))
        })?;
        // BTC/kvB -> sat/vB
        Ok(Self { conf_target, sat_per_vbyte: feerate * 100_000.0, blocks: raw.blocks })
    }
}
