//! Dashboard configuration - JSON file, environment overrides, device profiles
//!
//! Resolution order (highest first): CLI flags (applied by the binary),
//! environment, config file, defaults.
//!
//! | Env | Field |
//! |-----|-------|
//! | `ALPHA_DASHBOARD_CONFIG` | config file path |
//! | `BITCOIN_RPC_HOST` / `BITCOIN_RPC_PORT` | node endpoint |
//! | `BITCOIN_RPC_USER` / `BITCOIN_RPC_PASS` | basic auth |
//! | `BITCOIN_RPC_WALLET` | wallet path (`/wallet/<name>`) |
//! | `ALPHA_DASHBOARD_PROFILE` | `auto` / `standard` / `low-power` |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DashboardError, DashboardResult};

pub const CONFIG_ENV: &str = "ALPHA_DASHBOARD_CONFIG";
const APP_DIR: &str = "alpha-dashboard";
const CONFIG_FILE: &str = "config.json";

/// Bitcoin Core RPC endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub wallet: Option<String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8332,
            user: "admin".into(),
            password: "admin123".into(),
            wallet: None,
        }
    }
}

impl RpcConfig {
    pub fn url(&self) -> String {
        match self.wallet.as_deref().filter(|w| !w.is_empty()) {
            Some(wallet) => format!("http://{}:{}/wallet/{}", self.host, self.port, wallet),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

/// Hardware class. Low-power devices (Raspberry Pi and similar) get longer
/// timeouts and a slower update cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceProfile {
    #[default]
    Auto,
    Standard,
    LowPower,
}

impl DeviceProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceProfile::Auto => "auto",
            DeviceProfile::Standard => "standard",
            DeviceProfile::LowPower => "low-power",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Some(DeviceProfile::Auto),
            "standard" | "normal" => Some(DeviceProfile::Standard),
            "low-power" | "lowpower" | "low_power" | "pi" => Some(DeviceProfile::LowPower),
            _ => None,
        }
    }

    /// Replace `Auto` with the detected profile.
    pub fn resolve(self) -> Self {
        match self {
            DeviceProfile::Auto => Self::detect(),
            other => other,
        }
    }

    pub fn detect() -> Self {
        let model = std::fs::read_to_string("/proc/device-tree/model").unwrap_or_default();
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::classify(&model, cpus)
    }

    pub fn classify(board_model: &str, cpus: usize) -> Self {
        if board_model.to_ascii_lowercase().contains("raspberry pi") || cpus <= 2 {
            DeviceProfile::LowPower
        } else {
            DeviceProfile::Standard
        }
    }
}

impl std::str::FromStr for DeviceProfile {
    type Err = DashboardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DeviceProfile::from_str(value).ok_or_else(|| DashboardError::Config(format!("unknown device profile: {}", value)))
    }
}

/// Polling cadence, timeouts and resilience thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub base_timeout_secs: u64,
    pub connection_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub update_interval_ms: u64,
    pub max_retries: u32,
    /// Consecutive RPC failures before a full disconnect
    pub failure_threshold: u32,
    pub slow_scan_threshold_secs: u64,
    pub slow_retry_interval_secs: u64,
    pub block_poll_interval_ms: u64,
    pub block_error_backoff_ms: u64,
    pub reconnect_interval_secs: u64,
    pub retry_delay_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self { Self::for_profile(DeviceProfile::Standard) }
}

impl PollConfig {
    pub fn for_profile(profile: DeviceProfile) -> Self {
        let standard = Self {
            base_timeout_secs: 15,
            connection_timeout_secs: 30,
            max_timeout_secs: 120,
            update_interval_ms: 5_000,
            max_retries: 5,
            failure_threshold: 50,
            slow_scan_threshold_secs: 30,
            slow_retry_interval_secs: 15 * 60,
            block_poll_interval_ms: 2_000,
            block_error_backoff_ms: 5_000,
            reconnect_interval_secs: 60,
            retry_delay_ms: 2_000,
        };
        match profile.resolve() {
            DeviceProfile::LowPower => Self {
                base_timeout_secs: 45,
                connection_timeout_secs: 60,
                update_interval_ms: 20_000,
                max_retries: 8,
                ..standard
            },
            _ => standard,
        }
    }

    pub fn base_timeout(&self) -> Duration { Duration::from_secs(self.base_timeout_secs) }
    pub fn connection_timeout(&self) -> Duration { Duration::from_secs(self.connection_timeout_secs) }
    pub fn max_timeout(&self) -> Duration { Duration::from_secs(self.max_timeout_secs) }
    pub fn update_interval(&self) -> Duration { Duration::from_millis(self.update_interval_ms) }
    pub fn slow_scan_threshold(&self) -> Duration { Duration::from_secs(self.slow_scan_threshold_secs) }
    pub fn slow_retry_interval(&self) -> Duration { Duration::from_secs(self.slow_retry_interval_secs) }
    pub fn block_poll_interval(&self) -> Duration { Duration::from_millis(self.block_poll_interval_ms) }
    pub fn block_error_backoff(&self) -> Duration { Duration::from_millis(self.block_error_backoff_ms) }
    pub fn reconnect_interval(&self) -> Duration { Duration::from_secs(self.reconnect_interval_secs) }
    pub fn retry_delay(&self) -> Duration { Duration::from_millis(self.retry_delay_ms) }
}

/// Limits and constants for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub max_recent_blocks: usize,
    pub max_peers_display: usize,
    /// Fixed USD estimate; no price feed is queried
    pub btc_price_usd: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self { Self { max_recent_blocks: 50, max_peers_display: 20, btc_price_usd: 60_000.0 } }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub rpc: RpcConfig,
    pub profile: DeviceProfile,
    /// Explicit poll settings; derived from `profile` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollConfig>,
    pub display: DisplayConfig,
    /// Addresses monitored from startup
    pub addresses: Vec<String>,
}

impl DashboardConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_rpc(mut self, rpc: RpcConfig) -> Self { self.rpc = rpc; self }
    pub fn with_profile(mut self, profile: DeviceProfile) -> Self { self.profile = profile; self }
    pub fn with_poll(mut self, poll: PollConfig) -> Self { self.poll = Some(poll); self }
    pub fn with_display(mut self, display: DisplayConfig) -> Self { self.display = display; self }
    pub fn with_address(mut self, address: impl Into<String>) -> Self { self.addresses.push(address.into()); self }

    /// Effective poll settings.
    pub fn poll(&self) -> PollConfig {
        self.poll.clone().unwrap_or_else(|| PollConfig::for_profile(self.profile))
    }

    /// `$ALPHA_DASHBOARD_CONFIG`, else `<config_dir>/alpha-dashboard/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        env::var(CONFIG_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE)))
    }

    /// Load file (missing file means defaults), then apply env overrides.
    pub fn load(path: Option<&Path>) -> DashboardResult<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(&p)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> DashboardResult<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| DashboardError::Config(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&data)
            .map_err(|e| DashboardError::Config(format!("parse {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> DashboardResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        let var = |key: &str| env::var(key).ok().filter(|s| !s.is_empty());
        if let Some(host) = var("BITCOIN_RPC_HOST") { self.rpc.host = host; }
        if let Some(port) = var("BITCOIN_RPC_PORT") {
            match port.parse() {
                Ok(p) => self.rpc.port = p,
                Err(_) => tracing::warn!(%port, "ignoring invalid BITCOIN_RPC_PORT"),
            }
        }
        if let Some(user) = var("BITCOIN_RPC_USER") { self.rpc.user = user; }
        if let Some(pass) = var("BITCOIN_RPC_PASS") { self.rpc.password = pass; }
        if let Some(wallet) = var("BITCOIN_RPC_WALLET") { self.rpc.wallet = Some(wallet); }
        if let Some(profile) = var("ALPHA_DASHBOARD_PROFILE") {
            match DeviceProfile::from_str(&profile) {
                Some(p) => self.profile = p,
                None => tracing::warn!(%profile, "ignoring unknown ALPHA_DASHBOARD_PROFILE"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_node() {
        let rpc = RpcConfig::default();
        assert_eq!(rpc.url(), "http://127.0.0.1:8332");
        let display = DisplayConfig::default();
        assert_eq!(display.max_recent_blocks, 50);
        assert_eq!(display.max_peers_display, 20);
    }

    #[test]
    fn empty_wallet_name_is_ignored() {
        let rpc = RpcConfig { wallet: Some(String::new()), ..RpcConfig::default() };
        assert_eq!(rpc.url(), "http://127.0.0.1:8332");
    }

    #[test]
    fn profiles() {
        let standard = PollConfig::for_profile(DeviceProfile::Standard);
        assert_eq!(standard.base_timeout(), Duration::from_secs(15));
        assert_eq!(standard.connection_timeout(), Duration::from_secs(30));
        assert_eq!(standard.update_interval(), Duration::from_secs(5));
        assert_eq!(standard.max_retries, 5);
        assert_eq!(standard.failure_threshold, 50);

        let low = PollConfig::for_profile(DeviceProfile::LowPower);
        assert_eq!(low.base_timeout(), Duration::from_secs(45));
        assert_eq!(low.connection_timeout(), Duration::from_secs(60));
        assert_eq!(low.update_interval(), Duration::from_secs(20));
        assert_eq!(low.max_retries, 8);
        assert_eq!(low.slow_retry_interval(), Duration::from_secs(900));
    }

    #[test]
    fn classify_device() {
        assert_eq!(DeviceProfile::classify("Raspberry Pi 4 Model B Rev 1.4\0", 4), DeviceProfile::LowPower);
        assert_eq!(DeviceProfile::classify("", 2), DeviceProfile::LowPower);
        assert_eq!(DeviceProfile::classify("", 8), DeviceProfile::Standard);
        assert_ne!(DeviceProfile::Auto.resolve(), DeviceProfile::Auto);
    }

    #[test]
    fn profile_names() {
        assert_eq!(DeviceProfile::from_str("Low-Power"), Some(DeviceProfile::LowPower));
        assert_eq!(DeviceProfile::from_str("normal"), Some(DeviceProfile::Standard));
        assert_eq!(DeviceProfile::from_str("turbo"), None);
        assert_eq!("pi".parse::<DeviceProfile>().unwrap(), DeviceProfile::LowPower);
        assert!("turbo".parse::<DeviceProfile>().is_err());
        for p in [DeviceProfile::Auto, DeviceProfile::Standard, DeviceProfile::LowPower] {
            assert_eq!(DeviceProfile::from_str(p.as_str()), Some(p));
        }
    }

    #[test]
    fn explicit_poll_overrides_profile() {
        let poll = PollConfig { update_interval_ms: 250, ..PollConfig::default() };
        let config = DashboardConfig::new().with_profile(DeviceProfile::LowPower).with_poll(poll);
        assert_eq!(config.poll().update_interval_ms, 250);
        assert_eq!(DashboardConfig::new().with_profile(DeviceProfile::LowPower).poll().max_retries, 8);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: DashboardConfig = serde_json::from_str(r#"{"rpc": {"port": 18443}, "profile": "low-power"}"#).unwrap();
        assert_eq!(config.rpc.port, 18443);
        assert_eq!(config.rpc.user, "admin");
        assert_eq!(config.profile, DeviceProfile::LowPower);
        assert!(config.poll.is_none());
    }
}
