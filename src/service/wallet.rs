//! Wallet RPCs: info, descriptors, address generation, ownership, UTXOs, fees.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{BitcoinService, WalletMode};
use crate::error::{DashboardError, DashboardResult};
use crate::model::{
    self, AddressKind, DescriptorEntry, DescriptorList, FeeEstimate, RawFeeEstimate, ScanResult, Utxo, WalletInfo,
};
use crate::rpc::{methods, RpcFailure};

#[derive(Deserialize, Default)]
#[serde(default)]
struct AddressInfo {
    ismine: bool,
    iswatchonly: bool,
}

impl BitcoinService {
    pub async fn get_wallet_info(&self) -> DashboardResult<WalletInfo> {
        let value = self.guarded_call(methods::GET_WALLET_INFO, vec![]).await?;
        Ok(model::from_value(value)?)
    }

    /// Descriptors of a descriptor wallet; empty for legacy wallets.
    pub async fn list_descriptors(&self) -> DashboardResult<Vec<DescriptorEntry>> {
        if self.wallet_mode() != WalletMode::Descriptor {
            return Ok(Vec::new());
        }
        let value = self.guarded_call(methods::LIST_DESCRIPTORS, vec![]).await?;
        let list: DescriptorList = model::from_value(value)?;
        Ok(list.descriptors)
    }

    /// New receive address from the loaded wallet.
    pub async fn generate_wallet_address(&self, kind: AddressKind, label: Option<&str>) -> DashboardResult<String> {
        let value = self
            .guarded_call(methods::GET_NEW_ADDRESS, vec![json!(label.unwrap_or("")), json!(kind.as_rpc())])
            .await?;
        let address: String = model::from_value(value)?;
        tracing::info!(kind = kind.as_rpc(), %address, "generated wallet address");
        Ok(address)
    }

    /// One fresh address per supported type. Types the wallet refuses are skipped.
    pub async fn get_all_wallet_address_types(&self) -> DashboardResult<BTreeMap<AddressKind, String>> {
        let mut out = BTreeMap::new();
        for kind in AddressKind::ALL {
            match self.generate_wallet_address(kind, Some("alpha_dashboard")).await {
                Ok(address) => {
                    out.insert(kind, address);
                }
                Err(DashboardError::Rpc(RpcFailure::Node { code, message })) => {
                    tracing::debug!(kind = kind.as_rpc(), code, %message, "address type not supported by wallet");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Whether the loaded wallet owns (or watches) `address`.
    pub async fn validate_address_ownership(&self, address: &str) -> DashboardResult<bool> {
        model::parse_address(address)?;
        let value = self.guarded_call(methods::GET_ADDRESS_INFO, vec![json!(address)]).await?;
        let info: AddressInfo = model::from_value(value)?;
        Ok(info.ismine || info.iswatchonly)
    }

    /// UTXOs for `addresses`, from the wallet or a UTXO set scan.
    pub async fn get_unspent_outputs(&self, addresses: &[String]) -> DashboardResult<Vec<Utxo>> {
        for address in addresses {
            model::parse_address(address)?;
        }
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        if self.wallet_mode() == WalletMode::Legacy {
            return self.list_unspent(addresses).await;
        }
        let descriptors: Vec<String> = addresses.iter().map(|a| format!("addr({})", a)).collect();
        let value = self.guarded_call(methods::SCAN_TX_OUT_SET, vec![json!("start"), json!(descriptors)]).await?;
        let scan: ScanResult = model::from_value(value)?;
        Ok(scan.utxos())
    }

    /// Fee rate for confirmation within `conf_target` blocks, in sat/vB.
    pub async fn estimate_fee(&self, conf_target: u16) -> DashboardResult<FeeEstimate> {
        let target = conf_target.max(1);
        let value = self.guarded_call(methods::ESTIMATE_SMART_FEE, vec![json!(target)]).await?;
        let raw: RawFeeEstimate = model::from_value(value)?;
        Ok(FeeEstimate::from_raw(target, raw)?)
    }

    /// Wallet info plus descriptors, for the CLI `wallet` command.
    pub async fn wallet_summary(&self) -> DashboardResult<Value> {
        let info = self.get_wallet_info().await?;
        let descriptors = self.list_descriptors().await?;
        Ok(json!({
            "mode": self.wallet_mode(),
            "info": info,
            "descriptors": descriptors,
        }))
    }
}
