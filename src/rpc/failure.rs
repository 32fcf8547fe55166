//! RpcFailure - classified Bitcoin Core RPC errors
//!
//! Transport errors arrive as free text from the HTTP layer, so they are
//! classified by message. RPC errors carry Bitcoin Core's numeric codes.

use once_cell::sync::Lazy;
use regex::Regex;

/// `RPC_IN_WARMUP`
pub const CODE_WARMUP: i32 = -28;
/// `RPC_INVALID_PARAMETER`, also returned when a UTXO scan is already running
pub const CODE_INVALID_PARAMETER: i32 = -8;
/// `RPC_WALLET_ERROR`
pub const CODE_WALLET_ERROR: i32 = -4;
/// `RPC_WALLET_NOT_FOUND`
pub const CODE_WALLET_NOT_FOUND: i32 = -18;

static AUTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b401\b|\b403\b|unauthori[sz]ed|forbidden|incorrect rpcuser|authentication").expect("valid auth pattern")
});
static REFUSED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)connection refused|actively refused|unreachable|no route to host|os error 111\b|os error 61\b|failed to lookup address|name or service not known").expect("valid refused pattern")
});
static TIMEOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)timed out|timeout|would block|wouldblock|temporarily unavailable|os error 11\b|request-sent").expect("valid timeout pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcFailure {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("node is warming up: {0}")]
    Warmup(String),
    #[error("scan already in progress")]
    ScanInProgress,
    #[error("RPC error {code}: {message}")]
    Node { code: i32, message: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RpcFailure {
    /// Classify a JSON-RPC error object returned by the node.
    pub fn from_rpc_error(code: i32, message: &str) -> Self {
        match code {
            CODE_WARMUP => RpcFailure::Warmup(message.to_string()),
            CODE_INVALID_PARAMETER if message.to_ascii_lowercase().contains("in progress") => RpcFailure::ScanInProgress,
            _ => RpcFailure::Node { code, message: message.to_string() },
        }
    }

    /// Classify a transport-level failure by its message.
    pub fn from_transport(message: &str) -> Self {
        if AUTH_RE.is_match(message) {
            RpcFailure::Auth(message.to_string())
        } else if REFUSED_RE.is_match(message) {
            RpcFailure::ConnectionRefused(message.to_string())
        } else if TIMEOUT_RE.is_match(message) {
            RpcFailure::Timeout(message.to_string())
        } else {
            RpcFailure::Transport(message.to_string())
        }
    }

    /// Busy-node conditions that clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcFailure::Timeout(_) | RpcFailure::Warmup(_) | RpcFailure::ScanInProgress)
    }

    /// Conditions that warrant a longer timeout on the next attempt.
    pub fn wants_longer_timeout(&self) -> bool {
        matches!(self, RpcFailure::Timeout(_) | RpcFailure::Warmup(_))
    }

    /// Retrying cannot succeed without operator action.
    pub fn is_fatal_for_connect(&self) -> bool {
        matches!(self, RpcFailure::Auth(_) | RpcFailure::ConnectionRefused(_))
    }

    /// "Already exists" style answers that mean the request is a no-op.
    pub fn is_already_done(&self) -> bool {
        match self {
            RpcFailure::Node { message, .. } => {
                let m = message.to_ascii_lowercase();
                m.contains("already") || m.contains("duplicate")
            }
            _ => false,
        }
    }

    /// Status text for the dashboard.
    pub fn user_message(&self) -> String {
        match self {
            RpcFailure::Auth(_) => "Authentication failed - check rpcuser/rpcpassword".into(),
            RpcFailure::ConnectionRefused(_) => "Connection refused - is bitcoind running with server=1?".into(),
            RpcFailure::Timeout(_) => "Node busy - request timed out".into(),
            RpcFailure::Warmup(msg) => format!("Node warming up: {}", msg),
            RpcFailure::ScanInProgress => "Node busy - UTXO scan already in progress".into(),
            RpcFailure::Node { code, message } => format!("RPC Error {}: {}", code, message),
            RpcFailure::Transport(msg) => format!("Connection failed: {}", msg),
            RpcFailure::Decode(msg) => format!("Unexpected response: {}", msg),
        }
    }
}

impl From<bitcoincore_rpc::Error> for RpcFailure {
    fn from(e: bitcoincore_rpc::Error) -> Self {
        use bitcoincore_rpc::jsonrpc;
        match e {
            bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Rpc(err)) => Self::from_rpc_error(err.code, &err.message),
            bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Json(err)) => RpcFailure::Decode(err.to_string()),
            bitcoincore_rpc::Error::Json(err) => RpcFailure::Decode(err.to_string()),
            other => Self::from_transport(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_patterns_compile() {
        for re in [&AUTH_RE, &REFUSED_RE, &TIMEOUT_RE] {
            assert!(!Lazy::force(re).as_str().is_empty());
        }
    }

    #[test]
    fn classifies_http_auth_failure() {
        let f = RpcFailure::from_transport("JSON-RPC error: transport error: unexpected HTTP code: 401");
        assert!(matches!(f, RpcFailure::Auth(_)));
        assert!(f.is_fatal_for_connect());
        assert!(!f.is_transient());
    }

    #[test]
    fn classifies_refused_socket() {
        let f = RpcFailure::from_transport("Couldn't connect to host: Connection refused (os error 111)");
        assert!(matches!(f, RpcFailure::ConnectionRefused(_)));
    }

    #[test]
    fn classifies_timeouts() {
        for msg in ["operation timed out", "Resource temporarily unavailable (os error 11)", "Request-sent"] {
            let f = RpcFailure::from_transport(msg);
            assert!(matches!(f, RpcFailure::Timeout(_)), "{msg}");
            assert!(f.wants_longer_timeout());
        }
    }

    #[test]
    fn unknown_transport_text_stays_generic() {
        assert!(matches!(RpcFailure::from_transport("connection reset by peer"), RpcFailure::Transport(_)));
    }

    #[test]
    fn rpc_codes() {
        assert!(matches!(RpcFailure::from_rpc_error(-28, "Loading block index..."), RpcFailure::Warmup(_)));
        assert_eq!(RpcFailure::from_rpc_error(-8, "Scan already in progress, use action \"abort\" or \"status\""), RpcFailure::ScanInProgress);
        assert_eq!(
            RpcFailure::from_rpc_error(-8, "Invalid descriptor"),
            RpcFailure::Node { code: -8, message: "Invalid descriptor".into() }
        );
        assert!(RpcFailure::ScanInProgress.is_transient());
        assert!(!RpcFailure::ScanInProgress.wants_longer_timeout());
    }

    #[test]
    fn already_imported_is_noop() {
        let f = RpcFailure::from_rpc_error(CODE_WALLET_ERROR, "The wallet already contains the private key for this address or script");
        assert!(f.is_already_done());
        assert!(!RpcFailure::Timeout("x".into()).is_already_done());
    }

    #[test]
    fn user_messages_are_specific() {
        assert!(RpcFailure::Auth(String::new()).user_message().contains("rpcuser"));
        assert!(RpcFailure::ConnectionRefused(String::new()).user_message().contains("server=1"));
        assert!(RpcFailure::Timeout(String::new()).user_message().contains("busy"));
    }
}
