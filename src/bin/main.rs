//! Alpha Dashboard CLI
//!
//!   alpha-dashboard init                      → write config file
//!   alpha-dashboard status                    → connect, poll once, print state
//!   alpha-dashboard watch                     → monitor until Ctrl-C
//!   alpha-dashboard serve                     → monitor + HTTP API
//!   alpha-dashboard balance <address>         → balance + transactions
//!   alpha-dashboard wallet                    → wallet info + descriptors
//!   alpha-dashboard new-address [kind] [label]
//!   alpha-dashboard call <method> [json]      → raw RPC
//!
//! Precedence: CLI flags > env (including `.env`) > config file > defaults.

use alpha_dashboard::logging::init_logging;
use alpha_dashboard::{
    AddressKind, BitcoinService, DashboardConfig, DashboardEvent, DashboardState, DeviceProfile, Shutdown,
};
use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use std::env;
use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

const DEFAULT_HTTP_PORT: u16 = 8080;

fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);
    init_logging();

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("alpha-dashboard {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("init") => cmd_init(&opts),
        Some("status") => cmd_status(&opts),
        Some("watch") => cmd_watch(&opts),
        Some("serve") => cmd_serve(&opts),
        Some("balance") => cmd_balance(&opts),
        Some("wallet") => cmd_wallet(&opts),
        Some("new-address") => cmd_new_address(&opts),
        Some("call") => cmd_call(&opts),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = !opts.json && (opts.pretty || std::io::stdout().is_terminal());
    let render = |value: &Value| {
        let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
        rendered.unwrap_or_else(|_| value.to_string())
    };

    match result {
        Ok(output) => println!("{}", render(&output)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)})));
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    args: Vec<String>,
    // RPC options
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    wallet: Option<String>,
    config: Option<PathBuf>,
    low_power: bool,
    // Server options
    http_port: Option<u16>,
    // Output options
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

/// `KEY=value` lines from `.env`; existing env vars win.
fn load_dotenv() {
    let Ok(contents) = std::fs::read_to_string(".env") else { return };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() && env::var(key.trim()).is_err() {
                env::set_var(key.trim(), value);
            }
        }
    }
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        load_dotenv();

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            let mut takes_value = true;
            match arg.as_str() {
                "--help" | "-h" => { opts.help = true; takes_value = false; }
                "--version" | "-V" => { opts.version = true; takes_value = false; }
                "--json" => { opts.json = true; takes_value = false; }
                "--pretty" => { opts.pretty = true; takes_value = false; }
                "--low-power" => { opts.low_power = true; takes_value = false; }
                "--host" => opts.host = value,
                "--port" | "-p" => opts.port = value.and_then(|v| v.parse().ok()),
                "--user" | "-u" => opts.user = value,
                "--password" | "-P" => opts.password = value,
                "--wallet" | "-w" => opts.wallet = value,
                "--config" | "-c" => opts.config = value.map(PathBuf::from),
                "--port-http" => opts.http_port = value.and_then(|v| v.parse().ok()),
                _ if !arg.starts_with('-') || arg.parse::<f64>().is_ok() => {
                    positional.push(arg.clone());
                    takes_value = false;
                }
                _ => takes_value = false, // Ignore unknown flags
            }
            i += if takes_value { 2 } else { 1 };
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        opts.args = positional;

        if opts.http_port.is_none() {
            opts.http_port = env::var("ALPHA_DASHBOARD_HTTP_PORT").ok().and_then(|s| s.parse().ok());
        }

        opts
    }

    fn arg(&self, index: usize) -> Option<&str> { self.args.get(index).map(String::as_str) }

    /// File + env, then CLI flags on top.
    fn load_config(&self) -> anyhow::Result<DashboardConfig> {
        let mut config = DashboardConfig::load(self.config.as_deref()).context("loading config")?;
        if let Some(host) = &self.host { config.rpc.host = host.clone(); }
        if let Some(port) = self.port { config.rpc.port = port; }
        if let Some(user) = &self.user { config.rpc.user = user.clone(); }
        if let Some(password) = &self.password { config.rpc.password = password.clone(); }
        if let Some(wallet) = &self.wallet { config.rpc.wallet = Some(wallet.clone()); }
        if self.low_power { config.profile = DeviceProfile::LowPower; }
        Ok(config)
    }
}

fn print_usage() {
    println!(
        r#"alpha-dashboard - Bitcoin Core monitoring dashboard

USAGE:
    alpha-dashboard <command> [args] [options]

COMMANDS:
    init                        Write config file from current options
    status                      Connect, poll once, print dashboard state
    watch                       Monitor node and addresses until Ctrl-C
    serve                       Monitor + HTTP API
    balance <address>           Balance and recent transactions
    wallet                      Wallet info and descriptors
    new-address [kind] [label]  kind: legacy|p2sh-segwit|bech32|bech32m
    call <method> [json]        Raw RPC, params as JSON array

RPC OPTIONS:
    --host <host>               (env: BITCOIN_RPC_HOST, default 127.0.0.1)
    --port, -p <port>           (env: BITCOIN_RPC_PORT, default 8332)
    --user, -u <user>           (env: BITCOIN_RPC_USER)
    --password, -P <pass>       (env: BITCOIN_RPC_PASS)
    --wallet, -w <name>         (env: BITCOIN_RPC_WALLET)
    --config, -c <path>         (env: ALPHA_DASHBOARD_CONFIG)
    --low-power                 Longer timeouts, slower polling

SERVER OPTIONS:
    --port-http <port>          (env: ALPHA_DASHBOARD_HTTP_PORT, default 8080)

OUTPUT OPTIONS:
    --json                      Compact JSON
    --pretty                    Pretty-print JSON
    --version, -V               Print version

LOGGING:
    RUST_LOG=debug              Log filter (default: info)
    ALPHA_DASHBOARD_LOG_JSON=1  JSON logs on stderr

EXAMPLES:
    alpha-dashboard init --host 192.168.1.20 --user alice --password secret
    alpha-dashboard status --json | jq .blocks
    alpha-dashboard balance bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh
    alpha-dashboard call getblockhash '[0]'
"#
    );
}

fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    Ok(rt.block_on(future))
}

async fn connect(config: &DashboardConfig) -> anyhow::Result<Arc<BitcoinService>> {
    let service = BitcoinService::new(config);
    service
        .connect_to_node()
        .await
        .with_context(|| format!("connecting to {}", service.endpoint()))?;
    Ok(service)
}

/// Log every event until shutdown.
fn spawn_event_log(
    mut events: broadcast::Receiver<DashboardEvent>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                event = events.recv() => match event {
                    Ok(DashboardEvent::Error(message)) => tracing::error!(%message, "dashboard error"),
                    Ok(DashboardEvent::NewBlock(block)) => info!(height = block.height, txs = block.tx_count, "new block"),
                    Ok(DashboardEvent::AddressBalance(b)) => {
                        info!(address = %b.address, sats = b.balance.to_sat(), status = ?b.status, "balance")
                    }
                    Ok(DashboardEvent::Status(message)) => info!(%message, "status"),
                    Ok(DashboardEvent::ConnectionChanged(connected)) => info!(connected, "connection"),
                    Ok(other) => tracing::debug!(kind = other.kind(), "event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event log lagged"),
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

/// Monitor + state sink + event log, running until `shutdown` fires.
async fn run_monitor(
    config: &DashboardConfig,
    shutdown: &Shutdown,
) -> (Arc<BitcoinService>, Arc<RwLock<DashboardState>>, Vec<tokio::task::JoinHandle<()>>) {
    let service = BitcoinService::new(config);
    let state = Arc::new(RwLock::new(DashboardState::new(&config.display)));
    {
        let mut s = state.write().await;
        for address in service.monitored_addresses() {
            s.track_address(&address);
        }
    }
    let sink = DashboardState::follow(state.clone(), service.subscribe(), shutdown.subscribe());
    let log = spawn_event_log(service.subscribe(), shutdown.subscribe());
    let monitor = service.start_monitoring(shutdown.subscribe()).await;
    (service, state, vec![monitor, sink, log])
}

fn cmd_init(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.load_config()?;
    let path = opts
        .config
        .clone()
        .or_else(DashboardConfig::default_path)
        .ok_or_else(|| anyhow!("No config directory; pass --config <path>"))?;
    config.save(&path).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "config written");
    Ok(json!({"path": path.display().to_string(), "config": config}))
}

fn cmd_status(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.load_config()?;
    block_on(async {
        let service = BitcoinService::new(&config);
        let mut events = service.subscribe();
        service
            .connect_to_node()
            .await
            .with_context(|| format!("connecting to {}", service.endpoint()))?;
        service.update_data().await.context("polling node")?;
        service.update_all_monitored_addresses().await;

        let mut state = DashboardState::new(&config.display);
        loop {
            match events.try_recv() {
                Ok(event) => state.apply(&event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        anyhow::Ok(json!({
            "endpoint": service.endpoint(),
            "wallet_mode": service.wallet_mode(),
            "state": state,
        }))
    })?
}

fn cmd_watch(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.load_config()?;
    block_on(async {
        let shutdown = alpha_dashboard::install_signal_handlers();
        let (_service, state, handles) = run_monitor(&config, &shutdown).await;
        info!("watching, press Ctrl-C to stop");
        shutdown.wait().await;
        for handle in handles {
            let _ = handle.await;
        }
        let state = state.read().await.clone();
        anyhow::Ok(serde_json::to_value(state)?)
    })?
}

#[cfg(feature = "server")]
fn cmd_serve(opts: &ParsedArgs) -> anyhow::Result<Value> {
    use alpha_dashboard::server::create_router;

    let config = opts.load_config()?;
    let port = opts.http_port.unwrap_or(DEFAULT_HTTP_PORT);

    block_on(async {
        let shutdown = alpha_dashboard::install_signal_handlers();
        let (service, state, handles) = run_monitor(&config, &shutdown).await;

        let router = create_router(service, state);
        let addr = format!("0.0.0.0:{}", port);
        info!("alpha-dashboard listening on http://{}", addr);
        info!("  GET    /health");
        info!("  GET    /status");
        info!("  GET    /addresses");
        info!("  POST   /addresses          {{\"address\": ...}}");
        info!("  DELETE /addresses/:address");
        info!("  POST   /refresh");

        let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind {}", addr))?;

        let mut shutdown_rx = shutdown.subscribe();
        tokio::select! {
            result = axum::serve(listener, router) => {
                result.context("Server error")?;
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping server...");
            }
        }
        shutdown.trigger().await;
        for handle in handles {
            let _ = handle.await;
        }
        anyhow::Ok(json!({"status": "stopped"}))
    })?
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_opts: &ParsedArgs) -> anyhow::Result<Value> {
    anyhow::bail!("built without the `server` feature")
}

fn cmd_balance(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let address = opts.arg(0).ok_or_else(|| anyhow!("Usage: alpha-dashboard balance <address>"))?.to_string();
    let config = opts.load_config()?;
    block_on(async {
        let service = connect(&config).await?;
        service.add_address_to_monitor(&address).await?;
        let balance = service.update_address_balance(&address).await.context("fetching balance")?;
        let transactions = service.update_address_transactions(&address).await.unwrap_or_default();
        anyhow::Ok(json!({
            "address": address,
            "balance_btc": balance.balance.to_btc(),
            "balance_sat": balance.balance.to_sat(),
            "balance_usd": balance.balance_usd,
            "utxo_count": balance.utxo_count,
            "status": balance.status,
            "transactions": transactions,
        }))
    })?
}

fn cmd_wallet(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.load_config()?;
    block_on(async {
        let service = connect(&config).await?;
        anyhow::Ok(service.wallet_summary().await.context("reading wallet")?)
    })?
}

fn cmd_new_address(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let kind = match opts.arg(0) {
        Some(raw) => raw.parse::<AddressKind>().with_context(|| format!("Invalid address kind: {}", raw))?,
        None => AddressKind::Bech32,
    };
    let label = opts.arg(1).map(str::to_string);
    let config = opts.load_config()?;
    block_on(async {
        let service = connect(&config).await?;
        let address = service.generate_wallet_address(kind, label.as_deref()).await.context("getnewaddress")?;
        anyhow::Ok(json!({"address": address, "kind": kind}))
    })?
}

fn cmd_call(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let method = opts.arg(0).ok_or_else(|| anyhow!("Usage: alpha-dashboard call <method> [json-params]"))?.to_string();
    let params = match opts.args.get(1..).filter(|rest| !rest.is_empty()) {
        Some(rest) => parse_params(&rest.join(" "))?,
        None => Vec::new(),
    };
    let config = opts.load_config()?;
    block_on(async {
        let service = connect(&config).await?;
        anyhow::Ok(service.send_raw_command(&method, params).await.with_context(|| format!("calling {}", method))?)
    })?
}

/// JSON array of params, or a single JSON value treated as one param.
fn parse_params(raw: &str) -> anyhow::Result<Vec<Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(value) => Ok(vec![value]),
        Err(_) => Ok(vec![Value::String(raw.to_string())]),
    }
}
