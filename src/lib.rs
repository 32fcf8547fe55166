//! Alpha Dashboard: headless monitoring engine for a Bitcoin Core node.
//!
//! # Architecture
//!
//! ```text
//! DashboardConfig (file + env + CLI)
//!   │
//!   ├── BitcoinService
//!   │     ├── NodeRpc ──► CoreRpc (bitcoincore-rpc, HTTP basic auth)
//!   │     ├── TimeoutLadder / FailureTracker (busy node vs. lost node)
//!   │     ├── SlowAddressTracker (scan throttling)
//!   │     └── broadcast<DashboardEvent>
//!   │
//!   ├── Monitor task (update tick, block tick, reconnect)
//!   ├── DashboardState (events → display strings)
//!   └── HTTP server (feature `server`)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use alpha_dashboard::{BitcoinService, DashboardConfig, Shutdown};
//!
//! let config = DashboardConfig::load(None)?;
//! let service = BitcoinService::new(&config);
//! let shutdown = Shutdown::new();
//! let monitor = service.start_monitoring(shutdown.subscribe()).await;
//! service.add_address_to_monitor("bc1q...").await?;
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod logging;
pub mod model;
pub mod rpc;
pub mod runtime;
pub mod service;
pub mod state;
pub mod throttle;

#[cfg(feature = "server")]
pub mod server;

pub use backoff::{FailureTracker, FailureVerdict, TimeoutLadder};
pub use config::{DashboardConfig, DeviceProfile, DisplayConfig, PollConfig, RpcConfig};
pub use error::{DashboardError, DashboardResult};
pub use events::DashboardEvent;
pub use model::{AddressBalance, AddressKind, AddressTransaction, BalanceStatus, BlockSummary};
pub use rpc::{CoreRpc, NodeRpc, RpcFailure};
pub use runtime::{install_signal_handlers, Shutdown};
pub use service::{BitcoinService, RefreshReport, WalletMode};
pub use state::DashboardState;
pub use throttle::SlowAddressTracker;

#[cfg(feature = "server")]
pub use server::{create_router, create_router_with_name};
