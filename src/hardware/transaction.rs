//! 交易请求/响应契约
//!
//! 交给设备的未签名交易与签名结果的结构, 以及传输调用前后的校验。
//! BTC 与 ETH 两个币族。

use super::capabilities::Capabilities;
use super::catalog::{self, InputScriptType, OutputScriptType};
use super::path::Bip32Path;
use crate::core::errors::WalletError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 原始前序交易 (区块浏览器返回的结构)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrevTx {
    pub version: u32,
    pub locktime: u32,
    pub vin: Vec<PrevTxInput>,
    pub vout: Vec<PrevTxOutput>,
    /// Dash special transaction fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_payload: Option<String>,
}

/// 前序交易的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrevTxInput {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub sequence: Option<u32>,
    #[serde(default)]
    pub script_sig: Option<String>,
    #[serde(default)]
    pub coinbase: Option<String>,
}

/// 前序交易的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrevTxOutput {
    pub value: String,
    pub script_pub_key: String,
}

/// 待签名交易的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTxInput {
    pub address_n_list: Bip32Path,
    pub script_type: InputScriptType,
    pub txid: String,
    pub vout: Option<u32>,
    /// satoshis
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    /// Full previous transaction, required for non-witness inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<PrevTx>,
    /// Raw hex of the previous transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

/// 输出用途标记, 决定目标是地址还是路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputAddressType {
    Spend,
    Transfer,
    Change,
    Exchange,
}

/// 原生兑换的签名载荷 (需设备支持 native exchange)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeType {
    /// base64 encoded signed exchange response
    pub signed_exchange_response: String,
    pub withdrawal_coin_name: String,
    pub withdrawal_address_n_list: Bip32Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_script_type: Option<InputScriptType>,
    pub return_address_n_list: Bip32Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_script_type: Option<InputScriptType>,
}

/// 待签名交易的输出: `address` 与 `address_n_list` 二选一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTxOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_n_list: Option<Bip32Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_type: Option<OutputScriptType>,
    pub address_type: OutputAddressType,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_type: Option<ExchangeType>,
}

/// 待签名的 Bitcoin 系交易
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    pub coin: String,
    pub inputs: Vec<UnsignedTxInput>,
    pub outputs: Vec<UnsignedTxOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locktime: Option<u32>,
}

/// 每个输入一个签名, 外加完整序列化交易
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTx {
    pub signatures: Vec<String>,
    /// hex of the raw signed transaction
    pub serialized_tx: String,
}

fn invalid(msg: String) -> WalletError {
    WalletError::InvalidRequest(msg)
}

impl UnsignedTxInput {
    fn validate(&self, idx: usize) -> Result<(), WalletError> {
        if self.address_n_list.is_empty() {
            return Err(invalid(format!("input {} has an empty signing path", idx)));
        }
        if self.amount.is_none() {
            return Err(invalid(format!("input {} is missing its amount", idx)));
        }
        if self.vout.is_none() {
            return Err(invalid(format!("input {} is missing vout", idx)));
        }
        if self.txid.len() != 64 || hex::decode(&self.txid).is_err() {
            return Err(invalid(format!("input {} has a malformed txid", idx)));
        }
        if !self.script_type.is_witness() && self.tx.is_none() && self.hex.is_none() {
            return Err(invalid(format!(
                "input {} ({:?}) requires the previous transaction",
                idx, self.script_type
            )));
        }
        Ok(())
    }
}

impl UnsignedTxOutput {
    fn validate(&self, idx: usize, caps: &Capabilities) -> Result<(), WalletError> {
        match (&self.address, &self.address_n_list) {
            (Some(_), Some(_)) => {
                return Err(invalid(format!(
                    "output {} sets both address and addressNList",
                    idx
                )))
            }
            (None, None) => {
                return Err(invalid(format!(
                    "output {} sets neither address nor addressNList",
                    idx
                )))
            }
            _ => {}
        }

        let wants_path = matches!(
            self.address_type,
            OutputAddressType::Change | OutputAddressType::Transfer
        );
        if wants_path && self.address_n_list.is_none() {
            return Err(invalid(format!(
                "output {} ({:?}) requires addressNList",
                idx, self.address_type
            )));
        }
        if !wants_path && self.address.is_none() {
            return Err(invalid(format!(
                "output {} ({:?}) requires an address",
                idx, self.address_type
            )));
        }

        if self.address_type == OutputAddressType::Transfer && !caps.supports_secure_transfer() {
            return Err(WalletError::UnsupportedOperation(format!(
                "{} does not support secure transfer",
                caps.vendor
            )));
        }
        if self.exchange_type.is_some() && !caps.supports_native_exchange() {
            return Err(WalletError::UnsupportedOperation(format!(
                "{} does not support native exchange",
                caps.vendor
            )));
        }
        Ok(())
    }
}

impl UnsignedTx {
    /// 传输调用之前的本地校验
    ///
    /// 顺序: 币种 → 输入/输出非空 → 逐个输入 → 脚本类型能力 → 逐个输出。
    pub fn validate(&self, caps: &Capabilities) -> Result<(), WalletError> {
        catalog::coin(&self.coin)?;
        if !caps.supports_coin(&self.coin) {
            return Err(WalletError::UnsupportedOperation(format!(
                "{} does not support {}",
                caps.vendor, self.coin
            )));
        }
        if self.inputs.is_empty() {
            return Err(invalid("transaction has no inputs".to_string()));
        }
        if self.outputs.is_empty() {
            return Err(invalid("transaction has no outputs".to_string()));
        }

        for (idx, input) in self.inputs.iter().enumerate() {
            input.validate(idx)?;
            if !caps.supports_script_type(&self.coin, input.script_type) {
                return Err(WalletError::UnsupportedOperation(format!(
                    "{} cannot spend {:?} inputs on {}",
                    caps.vendor, input.script_type, self.coin
                )));
            }
        }
        for (idx, output) in self.outputs.iter().enumerate() {
            output.validate(idx, caps)?;
        }
        Ok(())
    }
}

impl SignedTx {
    /// 复核设备响应: 签名数等于输入数, 顺序保持
    pub fn from_payload(payload: &Value, input_count: usize) -> Result<Self, WalletError> {
        let signed: SignedTx = serde_json::from_value(payload.clone()).map_err(|e| {
            WalletError::DeviceResponseInvalid(format!("malformed signed transaction: {}", e))
        })?;

        if signed.signatures.len() != input_count {
            return Err(WalletError::DeviceResponseInvalid(format!(
                "device returned {} signatures for {} inputs",
                signed.signatures.len(),
                input_count
            )));
        }
        if signed.serialized_tx.is_empty() || hex::decode(&signed.serialized_tx).is_err() {
            return Err(WalletError::DeviceResponseInvalid(
                "serialized transaction is not hex".to_string(),
            ));
        }
        Ok(signed)
    }
}

/// 待签名的以太坊交易, 数值字段为 `0x` 前缀十六进制
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthSignTx {
    pub address_n_list: Bip32Path,
    pub nonce: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub to: String,
    pub value: String,
    #[serde(default)]
    pub data: String,
    pub chain_id: u64,
}

/// 以太坊签名结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthSignedTx {
    pub v: u64,
    /// 32-byte hex
    pub r: String,
    /// 32-byte hex
    pub s: String,
    pub serialized: String,
}

/// `0x` 加 40 个十六进制字符
pub fn is_eth_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .map_or(false, |h| h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_hex_quantity(value: &str) -> bool {
    match value.strip_prefix("0x") {
        Some("") => true,
        Some(digits) => digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn decode_hex32(field: &str, value: &str) -> Result<[u8; 32], WalletError> {
    let raw = hex::decode(value.trim_start_matches("0x"))
        .map_err(|_| WalletError::DeviceResponseInvalid(format!("{} is not hex", field)))?;
    <[u8; 32]>::try_from(raw.as_slice()).map_err(|_| {
        WalletError::DeviceResponseInvalid(format!("{} has {} bytes, expected 32", field, raw.len()))
    })
}

impl EthSignTx {
    /// 本地校验: 路径非空, 十六进制字段, chain id > 0
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.address_n_list.is_empty() {
            return Err(invalid("signing path is empty".to_string()));
        }
        if self.chain_id == 0 {
            return Err(invalid("chain id must be non-zero".to_string()));
        }
        if !is_eth_address(&self.to) {
            return Err(invalid(format!("malformed destination {}", self.to)));
        }
        for (name, value) in [
            ("nonce", &self.nonce),
            ("gasPrice", &self.gas_price),
            ("gasLimit", &self.gas_limit),
            ("value", &self.value),
        ] {
            if !is_hex_quantity(value) {
                return Err(invalid(format!("{} is not 0x-prefixed hex: {}", name, value)));
            }
        }
        if !self.data.is_empty() && !is_hex_quantity(&self.data) {
            return Err(invalid("data is not 0x-prefixed hex".to_string()));
        }
        Ok(())
    }
}

impl EthSignedTx {
    /// 解析设备返回的 `v`, `r`, `s` (各 32 字节)
    pub fn from_payload(payload: &Value) -> Result<Self, WalletError> {
        let signed: EthSignedTx = serde_json::from_value(payload.clone()).map_err(|e| {
            WalletError::DeviceResponseInvalid(format!("malformed signed transaction: {}", e))
        })?;
        decode_hex32("r", &signed.r)?;
        decode_hex32("s", &signed.s)?;
        if !is_hex_quantity(&signed.serialized) || signed.serialized.len() <= 2 {
            return Err(WalletError::DeviceResponseInvalid(
                "serialized transaction is not 0x-prefixed hex".to_string(),
            ));
        }
        Ok(signed)
    }
}
