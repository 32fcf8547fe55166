//! Display conversions for dashboard labels and list rows.

use bitcoin::Amount;
use chrono::DateTime;

use crate::model::{AddressTransaction, BlockSummary, PeerInfo, TxDirection};

pub const UNKNOWN: &str = "Unknown";

/// `1234567` -> `1,234,567`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn difficulty(d: f64) -> String {
    if d > 1e12 {
        format!("{:.2}T", d / 1e12)
    } else if d > 1e9 {
        format!("{:.2}B", d / 1e9)
    } else if d > 1e6 {
        format!("{:.2}M", d / 1e6)
    } else {
        thousands(d.max(0.0).round() as u64)
    }
}

pub fn disk_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b > 1e9 {
        format!("{:.2} GB", b / 1e9)
    } else if b > 1e6 {
        format!("{:.2} MB", b / 1e6)
    } else {
        format!("{} bytes", thousands(bytes))
    }
}

pub fn mempool_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if b > 1e6 {
        format!("{:.2} MB", b / 1e6)
    } else if b > 1e3 {
        format!("{:.2} KB", b / 1e3)
    } else {
        format!("{} bytes", bytes)
    }
}

pub fn mempool_size(txs: u64) -> String { format!("{} transactions", thousands(txs)) }

/// Verification progress (0.0..=1.0) as a whole percent.
pub fn progress_percent(progress: f64) -> u8 {
    if !progress.is_finite() {
        return 0;
    }
    (progress * 100.0).clamp(0.0, 100.0) as u8
}

fn format_secs(secs: i64, pattern: &str) -> String {
    if secs <= 0 {
        return UNKNOWN.to_string();
    }
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format(pattern).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// UTC `%Y-%m-%d %H:%M:%S`.
pub fn timestamp(secs: i64) -> String { format_secs(secs, "%Y-%m-%d %H:%M:%S") }

/// UTC `%m/%d %H:%M`.
pub fn short_timestamp(secs: i64) -> String { format_secs(secs, "%m/%d %H:%M") }

pub fn btc(amount: Amount) -> String { format!("{:.8} BTC", amount.to_btc()) }

pub fn usd(value: f64) -> String { format!("≈ ${:.2} USD", value) }

/// First 16 characters followed by an ellipsis.
pub fn short_hash(hash: &str) -> String {
    if hash.chars().count() <= 16 {
        return hash.to_string();
    }
    format!("{}...", hash.chars().take(16).collect::<String>())
}

pub fn confirmation_marker(confirmations: i64) -> String {
    if confirmations >= 6 {
        "confirmed".into()
    } else if confirmations > 0 {
        format!("{} conf", confirmations)
    } else {
        "unconfirmed".into()
    }
}

pub fn block_line(block: &BlockSummary) -> String {
    format!("Block #{} - {} - {} txs", block.height, timestamp(block.time), block.tx_count)
}

pub fn peer_line(peer: &PeerInfo) -> String {
    let addr = if peer.addr.is_empty() { UNKNOWN } else { peer.addr.as_str() };
    let subver = if peer.subver.is_empty() { UNKNOWN } else { peer.subver.as_str() };
    format!("{} - {} (v{}) - Connected: {}", addr, subver, peer.version, timestamp(peer.conntime))
}

pub fn transaction_line(tx: &AddressTransaction) -> String {
    let kind = match tx.direction {
        TxDirection::Received => "Received",
        TxDirection::Sent => "Sent",
    };
    let when = if tx.time > 0 { short_timestamp(tx.time) } else { "pending".to_string() };
    format!("[{}] {} {:.8} BTC - {}", confirmation_marker(tx.confirmations), kind, tx.amount.to_btc(), when)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_000), "1,000");
        assert_eq!(thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn difficulty_units() {
        assert_eq!(difficulty(83_148_355_189_239.77), "83.15T");
        assert_eq!(difficulty(2_500_000_000.0), "2.50B");
        assert_eq!(difficulty(4_200_000.0), "4.20M");
        assert_eq!(difficulty(1.0), "1");
        assert_eq!(difficulty(123_456.4), "123,456");
    }

    #[test]
    fn byte_sizes() {
        assert_eq!(disk_size(600_000_000_000), "600.00 GB");
        assert_eq!(disk_size(12_340_000), "12.34 MB");
        assert_eq!(disk_size(4_096), "4,096 bytes");
        assert_eq!(mempool_bytes(1_500), "1.50 KB");
        assert_eq!(mempool_bytes(2_000_000), "2.00 MB");
        assert_eq!(mempool_bytes(512), "512 bytes");
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(progress_percent(0.9999), 99);
        assert_eq!(progress_percent(1.0), 100);
        assert_eq!(progress_percent(1.2), 100);
        assert_eq!(progress_percent(-0.1), 0);
        assert_eq!(progress_percent(f64::NAN), 0);
    }

    #[test]
    fn timestamps_are_utc() {
        assert_eq!(timestamp(1_231_006_505), "2009-01-03 18:15:05");
        assert_eq!(short_timestamp(1_231_006_505), "01/03 18:15");
        assert_eq!(timestamp(0), "Unknown");
    }

    #[test]
    fn amounts() {
        assert_eq!(btc(Amount::from_sat(12_345)), "0.00012345 BTC");
        assert_eq!(btc(Amount::ZERO), "0.00000000 BTC");
        assert_eq!(usd(7.5), "≈ $7.50 USD");
    }

    #[test]
    fn confirmations() {
        assert_eq!(confirmation_marker(6), "confirmed");
        assert_eq!(confirmation_marker(3), "3 conf");
        assert_eq!(confirmation_marker(0), "unconfirmed");
        assert_eq!(confirmation_marker(-1), "unconfirmed");
    }

    #[test]
    fn list_rows() {
        let block = BlockSummary { hash: "00".into(), height: 840_000, time: 1_231_006_505, tx_count: 12 };
        assert_eq!(block_line(&block), "Block #840000 - 2009-01-03 18:15:05 - 12 txs");

        let peer = PeerInfo { addr: "1.2.3.4:8333".into(), subver: "/Satoshi:27.0.0/".into(), version: 70016, ..Default::default() };
        assert_eq!(peer_line(&peer), "1.2.3.4:8333 - /Satoshi:27.0.0/ (v70016) - Connected: Unknown");

        let tx = AddressTransaction {
            txid: "ab".into(),
            direction: TxDirection::Received,
            amount: Amount::from_sat(100_000),
            confirmations: 2,
            time: 0,
        };
        assert_eq!(transaction_line(&tx), "[2 conf] Received 0.00100000 BTC - pending");
        assert_eq!(short_hash("0123456789abcdef0123"), "0123456789abcdef...");
        assert_eq!(short_hash("abc"), "abc");
    }
}
