//! Scripted `NodeRpc` for service and monitor tests.

#![allow(dead_code)]

use alpha_dashboard::rpc::NodeRpc;
use alpha_dashboard::{DashboardConfig, PollConfig, RpcFailure};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const SEGWIT_ADDR: &str = "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh";
pub const LEGACY_ADDR: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
pub const P2SH_ADDR: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
pub const TESTNET_ADDR: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

#[derive(Debug, Clone)]
pub struct Call {
    pub method: String,
    pub params: Vec<Value>,
    pub timeout: Duration,
}

/// Per-method responses: queued answers first, then the fallback.
#[derive(Default)]
pub struct MockRpc {
    queued: Mutex<HashMap<String, VecDeque<Result<Value, RpcFailure>>>>,
    fallback: Mutex<HashMap<String, Result<Value, RpcFailure>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<Call>>,
}

impl MockRpc {
    pub fn new() -> Self { Self::default() }

    /// Node on mainnet with a descriptor wallet and empty mempool.
    pub fn healthy() -> Self {
        let rpc = Self::new();
        rpc.always("getblockchaininfo", Ok(blockchain_info(840_000)));
        rpc.always("getwalletinfo", Ok(json!({"walletname": "watch", "descriptors": true})));
        rpc.always("getnetworkinfo", Ok(json!({"version": 270000, "subversion": "/Satoshi:27.0.0/", "protocolversion": 70016, "connections": 10, "networkactive": true})));
        rpc.always("getmempoolinfo", Ok(json!({"size": 1200, "bytes": 1_500, "usage": 4000})));
        rpc.always("getpeerinfo", Ok(json!([])));
        rpc
    }

    pub fn always(&self, method: &str, response: Result<Value, RpcFailure>) -> &Self {
        self.fallback.lock().unwrap().insert(method.to_string(), response);
        self
    }

    pub fn then(&self, method: &str, response: Result<Value, RpcFailure>) -> &Self {
        self.queued.lock().unwrap().entry(method.to_string()).or_default().push_back(response);
        self
    }

    pub fn delay(&self, method: &str, delay: Duration) -> &Self {
        self.delays.lock().unwrap().insert(method.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> { self.calls.lock().unwrap().clone() }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }

    pub fn count(&self, method: &str) -> usize { self.calls_to(method).len() }
}

impl NodeRpc for MockRpc {
    fn call(&self, method: &str, params: &[Value], timeout: Duration) -> Result<Value, RpcFailure> {
        self.calls.lock().unwrap().push(Call { method: method.to_string(), params: params.to_vec(), timeout });
        if let Some(delay) = self.delays.lock().unwrap().get(method).copied() {
            std::thread::sleep(delay);
        }
        if let Some(response) = self.queued.lock().unwrap().get_mut(method).and_then(VecDeque::pop_front) {
            return response;
        }
        self.fallback
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or_else(|| Err(RpcFailure::Node { code: -32601, message: "Method not found".into() }))
    }

    fn endpoint(&self) -> String { "mock://bitcoind".into() }
}

pub fn blockchain_info(blocks: u64) -> Value {
    json!({
        "chain": "main",
        "blocks": blocks,
        "headers": blocks,
        "bestblockhash": format!("{:064x}", blocks),
        "difficulty": 83_148_355_189_239.77,
        "verificationprogress": 0.99999,
        "size_on_disk": 600_000_000_000u64,
        "initialblockdownload": false,
        "pruned": false
    })
}

pub fn scan_result(height: u64, unspents: &[(&str, f64, u64)]) -> Value {
    let total: f64 = unspents.iter().map(|(_, amount, _)| amount).sum();
    json!({
        "success": true,
        "height": height,
        "total_amount": total,
        "unspents": unspents.iter().enumerate().map(|(i, (txid, amount, h))| json!({
            "txid": txid, "vout": i, "amount": amount, "height": h, "desc": format!("addr({})#x", SEGWIT_ADDR)
        })).collect::<Vec<_>>()
    })
}

pub fn timeout() -> RpcFailure { RpcFailure::Timeout("timed out".into()) }

/// Poll settings with no sleeps between connect retries.
pub fn fast_poll() -> PollConfig {
    PollConfig { retry_delay_ms: 0, block_error_backoff_ms: 10, ..PollConfig::default() }
}

pub fn test_config() -> DashboardConfig { DashboardConfig::new().with_poll(fast_poll()) }
