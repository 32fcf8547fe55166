//! Monitor loop lifecycle and the state sink.

mod common;

use alpha_dashboard::{
    BitcoinService, DashboardConfig, DashboardState, PollConfig, RpcFailure, Shutdown,
};
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

fn quick_poll() -> PollConfig {
    PollConfig {
        update_interval_ms: 20,
        block_poll_interval_ms: 10,
        block_error_backoff_ms: 10,
        retry_delay_ms: 0,
        max_retries: 1,
        ..PollConfig::default()
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn polls_until_shutdown_then_disconnects() {
    let rpc = Arc::new(MockRpc::healthy());
    rpc.always("getbestblockhash", Ok(json!(format!("{:064x}", 1))));
    let service = BitcoinService::with_rpc(rpc.clone(), &DashboardConfig::new().with_poll(quick_poll()));
    let shutdown = Shutdown::new();

    let handle = service.start_monitoring(shutdown.subscribe()).await;
    assert!(service.is_connected());

    wait_until(|| rpc.count("getnetworkinfo") >= 2 && rpc.count("getbestblockhash") >= 2).await;
    shutdown.trigger().await;
    tokio::time::timeout(Duration::from_secs(5), handle).await.expect("monitor exits").expect("join");
    assert!(!service.is_connected());
}

#[tokio::test]
async fn starts_without_node_and_reconnects() {
    let rpc = Arc::new(MockRpc::healthy());
    rpc.then("getblockchaininfo", Err(RpcFailure::ConnectionRefused("refused".into())));
    let poll = PollConfig { reconnect_interval_secs: 0, ..quick_poll() };
    let service = BitcoinService::with_rpc(rpc.clone(), &DashboardConfig::new().with_poll(poll));
    let shutdown = Shutdown::new();

    let handle = service.start_monitoring(shutdown.subscribe()).await;
    assert!(service.is_no_node_mode());
    assert!(!service.is_connected());

    wait_until(|| service.is_connected()).await;
    assert!(!service.is_no_node_mode());

    shutdown.trigger().await;
    tokio::time::timeout(Duration::from_secs(5), handle).await.expect("monitor exits").expect("join");
}

#[tokio::test]
async fn no_reconnect_before_interval() {
    let rpc = Arc::new(MockRpc::new());
    rpc.always("getblockchaininfo", Err(RpcFailure::ConnectionRefused("refused".into())));
    let service = BitcoinService::with_rpc(rpc.clone(), &DashboardConfig::new().with_poll(quick_poll()));
    let shutdown = Shutdown::new();

    let handle = service.start_monitoring(shutdown.subscribe()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    // Reconnect interval is 60s: only the initial probe ran
    assert_eq!(rpc.count("getblockchaininfo"), 1);

    shutdown.trigger().await;
    tokio::time::timeout(Duration::from_secs(5), handle).await.expect("monitor exits").expect("join");
}

#[tokio::test]
async fn failing_poll_method_does_not_stop_address_refresh() {
    let rpc = Arc::new(MockRpc::healthy());
    rpc.always("getpeerinfo", Err(RpcFailure::Transport("broken pipe".into())));
    rpc.always("scantxoutset", Ok(scan_result(100, &[("aa", 0.1, 90)])));
    let poll = PollConfig { failure_threshold: 1_000, ..quick_poll() };
    let config = DashboardConfig::new().with_poll(poll).with_address(SEGWIT_ADDR);
    let service = BitcoinService::with_rpc(rpc.clone(), &config);
    let shutdown = Shutdown::new();

    let handle = service.start_monitoring(shutdown.subscribe()).await;
    wait_until(|| rpc.count("getpeerinfo") >= 3 && rpc.count("scantxoutset") >= 3).await;
    assert!(service.is_connected());
    assert_eq!(service.address_balance(SEGWIT_ADDR).map(|b| b.balance.to_sat()), Some(10_000_000));

    shutdown.trigger().await;
    tokio::time::timeout(Duration::from_secs(5), handle).await.expect("monitor exits").expect("join");
}

#[tokio::test]
async fn state_sink_follows_service_events() {
    let rpc = Arc::new(MockRpc::healthy());
    rpc.always("scantxoutset", Ok(scan_result(100, &[("aa", 0.25, 95)])));
    let config = DashboardConfig::new().with_poll(quick_poll()).with_address(SEGWIT_ADDR);
    let service = BitcoinService::with_rpc(rpc.clone(), &config);
    let state = Arc::new(RwLock::new(DashboardState::new(&config.display)));
    let shutdown = Shutdown::new();

    let sink = DashboardState::follow(state.clone(), service.subscribe(), shutdown.subscribe());
    let monitor = service.start_monitoring(shutdown.subscribe()).await;

    for _ in 0..200 {
        let ready = {
            let s = state.read().await;
            s.connected
                && s.mempool_bytes != "-"
                && s.addresses
                    .get(SEGWIT_ADDR)
                    .map(|v| v.balance == "0.25000000 BTC" && !v.transactions.is_empty())
                    .unwrap_or(false)
        };
        if ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    {
        let s = state.read().await;
        assert_eq!(s.connection, "Connected");
        assert_eq!(s.chain, "main");
        assert_eq!(s.blocks, "840,000");
        assert_eq!(s.mempool_bytes, "1.50 KB");
        assert_eq!(s.addresses[SEGWIT_ADDR].balance, "0.25000000 BTC");
        assert_eq!(s.addresses[SEGWIT_ADDR].transactions.len(), 1);
    }

    shutdown.trigger().await;
    let _ = tokio::time::timeout(Duration::from_secs(5), monitor).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), sink).await;
}
