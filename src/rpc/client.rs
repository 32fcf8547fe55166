//! CoreRpc - bitcoincore-rpc client with per-call timeouts
//!
//! The stock `Client::new` fixes the HTTP timeout at construction, so one
//! client is built per distinct timeout on the simple-HTTP transport and
//! cached for reuse.

use bitcoincore_rpc::jsonrpc::{self, simple_http::SimpleHttpTransport};
use bitcoincore_rpc::{Client, RpcApi};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{NodeRpc, RpcFailure};
use crate::config::RpcConfig;

pub struct CoreRpc {
    url: String,
    user: String,
    password: String,
    clients: Mutex<HashMap<Duration, Arc<Client>>>,
}

impl CoreRpc {
    pub fn new(config: &RpcConfig) -> Self {
        Self {
            url: config.url(),
            user: config.user.clone(),
            password: config.password.clone(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, timeout: Duration) -> Result<Arc<Client>, RpcFailure> {
        let mut clients = self.clients.lock().map_err(|_| RpcFailure::Transport("client cache lock".into()))?;
        if let Some(client) = clients.get(&timeout) {
            return Ok(client.clone());
        }
        let transport = SimpleHttpTransport::builder()
            .url(&self.url)
            .map_err(|e| RpcFailure::Transport(format!("invalid url {}: {}", self.url, e)))?
            .timeout(timeout)
            .auth(self.user.as_str(), Some(self.password.as_str()))
            .build();
        let client = Arc::new(Client::from_jsonrpc(jsonrpc::Client::with_transport(transport)));
        clients.insert(timeout, client.clone());
        Ok(client)
    }
}

impl NodeRpc for CoreRpc {
    fn call(&self, method: &str, params: &[Value], timeout: Duration) -> Result<Value, RpcFailure> {
        let client = self.client_for(timeout)?;
        tracing::trace!(method, timeout_secs = timeout.as_secs(), "rpc call");
        client.call::<Value>(method, params).map_err(RpcFailure::from)
    }

    fn endpoint(&self) -> String { self.url.clone() }
}
