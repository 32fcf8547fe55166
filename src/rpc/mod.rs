//! RPC - the seam between the dashboard and Bitcoin Core
//!
//! ```text
//! BitcoinService
//!     │  call(method, params, timeout)
//!     ▼
//! NodeRpc (trait, blocking)
//!     │
//!     ├── CoreRpc   → bitcoincore-rpc → HTTP basic auth → bitcoind
//!     └── test doubles (scripted responses)
//! ```

mod client;
mod failure;

pub use client::CoreRpc;
pub use failure::{RpcFailure, CODE_INVALID_PARAMETER, CODE_WALLET_ERROR, CODE_WALLET_NOT_FOUND, CODE_WARMUP};

use serde_json::Value;
use std::time::Duration;

/// Blocking JSON-RPC transport to a Bitcoin node.
pub trait NodeRpc: Send + Sync {
    fn call(&self, method: &str, params: &[Value], timeout: Duration) -> Result<Value, RpcFailure>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> String { "bitcoind".into() }
}

/// Method names used by the dashboard.
pub mod methods {
    pub const GET_BLOCKCHAIN_INFO: &str = "getblockchaininfo";
    pub const GET_NETWORK_INFO: &str = "getnetworkinfo";
    pub const GET_MEMPOOL_INFO: &str = "getmempoolinfo";
    pub const GET_PEER_INFO: &str = "getpeerinfo";
    pub const GET_BEST_BLOCK_HASH: &str = "getbestblockhash";
    pub const GET_BLOCK: &str = "getblock";
    pub const GET_RAW_TRANSACTION: &str = "getrawtransaction";
    pub const LIST_UNSPENT: &str = "listunspent";
    pub const SCAN_TX_OUT_SET: &str = "scantxoutset";
    pub const IMPORT_ADDRESS: &str = "importaddress";
    pub const LIST_TRANSACTIONS: &str = "listtransactions";
    pub const GET_WALLET_INFO: &str = "getwalletinfo";
    pub const LIST_DESCRIPTORS: &str = "listdescriptors";
    pub const GET_NEW_ADDRESS: &str = "getnewaddress";
    pub const GET_ADDRESS_INFO: &str = "getaddressinfo";
    pub const ESTIMATE_SMART_FEE: &str = "estimatesmartfee";
}
