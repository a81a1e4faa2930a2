//! 钱包外观层
//!
//! `DeviceWallet` 持有一个传输句柄, 在其上实现厂商无关的
//! `HdWallet` / `BtcWallet` / `EthWallet`。请求先在本地校验, 同一句柄上的设备操作
//! 串行执行, 每个失败响应都经过 [`status::translate`] 归类。

use super::accounts::{self, AccountPath};
use super::capabilities::{Capabilities, Vendor};
use super::catalog::{self, AddressFormat, CoinInfo, InputScriptType};
use super::message;
use super::path::{is_hardened, Bip32Path, HARDENED};
use super::status::{self, CallContext};
use super::transaction::{is_eth_address, EthSignTx, EthSignedTx, SignedTx, UnsignedTx};
use super::transport::Transport;
use super::xpub::{self, ExtendedPublicKey, XpubParts};
use crate::core::config::{BusyPolicy, WalletConfig};
use crate::core::errors::{WalletError, WalletResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEVICE_NS: &str = "Device";
const BTC_NS: &str = "Btc";
const ETH_NS: &str = "Eth";

// ---- request / response shapes ----

/// xpub 导出请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPublicKey {
    pub address_n_list: Bip32Path,
    /// Defaults to Bitcoin
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(default)]
    pub script_type: Option<InputScriptType>,
    #[serde(default)]
    pub show_display: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub xpub: String,
}

/// BTC 地址请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BtcGetAddress {
    pub address_n_list: Bip32Path,
    pub coin: String,
    #[serde(default)]
    pub script_type: Option<InputScriptType>,
    #[serde(default)]
    pub show_display: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BtcSignMessage {
    pub address_n_list: Bip32Path,
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(default)]
    pub script_type: Option<InputScriptType>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcVerifyMessage {
    pub address: String,
    pub message: String,
    /// base64 or hex
    pub signature: String,
    pub coin: String,
}

/// 消息签名结果: 地址与签名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub address: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthGetAddress {
    pub address_n_list: Bip32Path,
    #[serde(default)]
    pub show_display: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthSignMessage {
    pub address_n_list: Bip32Path,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthVerifyMessage {
    pub address: String,
    pub message: String,
    /// `0x`-prefixed `r ‖ s ‖ v`
    pub signature: String,
}

/// 新建种子
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetDevice {
    /// 128, 192 or 256 bits
    #[serde(default)]
    pub entropy: Option<u16>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub passphrase: bool,
    #[serde(default)]
    pub pin: bool,
}

/// 从助记词恢复
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverDevice {
    #[serde(default)]
    pub entropy: Option<u16>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub passphrase: bool,
    #[serde(default)]
    pub pin: bool,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadDevice {
    /// 12, 18 or 24 word mnemonic
    pub mnemonic: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub passphrase: bool,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub skip_checksum: bool,
}

/// 熵长度只能是 128/192/256
fn check_entropy(entropy: Option<u16>) -> WalletResult<()> {
    match entropy {
        None | Some(128) | Some(192) | Some(256) => Ok(()),
        Some(other) => Err(WalletError::InvalidRequest(format!(
            "entropy must be 128, 192 or 256 bits, got {}",
            other
        ))),
    }
}

impl LoadDevice {
    fn validate(&self) -> WalletResult<()> {
        let words = self.mnemonic.split_whitespace().count();
        if ![12, 18, 24].contains(&words) {
            return Err(WalletError::InvalidRequest(format!(
                "mnemonic has {} words, expected 12, 18 or 24",
                words
            )));
        }
        Ok(())
    }
}

// ---- traits ----

/// 所有硬件钱包句柄都提供的操作
#[async_trait]
pub trait HdWallet: Send + Sync {
    fn get_vendor(&self) -> Vendor;
    fn capabilities(&self) -> &Capabilities;

    fn get_device_id(&self) -> String;
    async fn get_model(&self) -> WalletResult<String>;
    /// 设备未设置标签时为空
    async fn get_label(&self) -> WalletResult<String>;

    /// 批量导出 xpub; 保持顺序, 首个失败即中止
    async fn get_public_keys(&self, requests: &[GetPublicKey]) -> WalletResult<Vec<PublicKey>>;

    async fn initialize(&self) -> WalletResult<()>;
    async fn ping(&self, msg: &str) -> WalletResult<String>;
    async fn is_locked(&self) -> WalletResult<bool>;
    async fn clear_session(&self) -> WalletResult<()>;
    async fn send_pin(&self, pin: &str) -> WalletResult<()>;
    async fn send_passphrase(&self, passphrase: &str) -> WalletResult<()>;
    async fn send_character(&self, character: &str) -> WalletResult<()>;
    async fn send_word(&self, word: &str) -> WalletResult<()>;
    /// 中止进行中的操作, 句柄仍可用
    async fn cancel(&self) -> WalletResult<()>;
    async fn wipe(&self) -> WalletResult<()>;
    async fn reset(&self, request: &ResetDevice) -> WalletResult<()>;
    async fn recover(&self, request: &RecoverDevice) -> WalletResult<()>;
    async fn load_device(&self, request: &LoadDevice) -> WalletResult<()>;

    fn has_on_device_pin_entry(&self) -> bool {
        self.capabilities().has_on_device_pin_entry()
    }

    fn has_on_device_passphrase(&self) -> bool {
        self.capabilities().has_on_device_passphrase()
    }

    fn has_on_device_display(&self) -> bool {
        self.capabilities().has_on_device_display()
    }

    fn has_on_device_recovery(&self) -> bool {
        self.capabilities().has_on_device_recovery()
    }

    fn has_native_exchange(&self, src_coin: &str, dst_coin: &str) -> bool {
        self.capabilities().has_native_exchange(src_coin, dst_coin)
    }
}

/// BTC 系操作
#[async_trait]
pub trait BtcWallet: HdWallet {
    fn btc_supports_coin(&self, coin: &str) -> bool {
        self.capabilities().supports_coin(coin)
    }

    fn btc_supports_script_type(&self, coin: &str, script_type: InputScriptType) -> bool {
        self.capabilities().supports_script_type(coin, script_type)
    }

    fn btc_supports_secure_transfer(&self) -> bool {
        self.capabilities().supports_secure_transfer()
    }

    fn btc_supports_native_exchange(&self) -> bool {
        self.capabilities().supports_native_exchange()
    }

    fn btc_get_account_paths(
        &self,
        coin: &str,
        account: u32,
        script_type: Option<InputScriptType>,
    ) -> WalletResult<Vec<AccountPath>> {
        accounts::get_account_paths(coin, account, script_type)
    }

    fn btc_is_same_account(&self, paths: &[AccountPath]) -> bool {
        accounts::is_same_account(paths)
    }

    async fn btc_get_address(&self, request: &BtcGetAddress) -> WalletResult<String>;
    async fn btc_sign_tx(&self, tx: &UnsignedTx) -> WalletResult<SignedTx>;
    async fn btc_sign_message(&self, request: &BtcSignMessage) -> WalletResult<SignedMessage>;
    async fn btc_verify_message(&self, request: &BtcVerifyMessage) -> WalletResult<bool>;
}

/// 以太坊操作
#[async_trait]
pub trait EthWallet: HdWallet {
    fn eth_get_account_paths(&self, account: u32) -> WalletResult<Vec<Bip32Path>> {
        accounts::eth_get_account_paths(account)
    }

    async fn eth_get_address(&self, request: &EthGetAddress) -> WalletResult<String>;
    async fn eth_sign_tx(&self, tx: &EthSignTx) -> WalletResult<EthSignedTx>;
    async fn eth_sign_message(&self, request: &EthSignMessage) -> WalletResult<SignedMessage>;
    async fn eth_verify_message(&self, request: &EthVerifyMessage) -> WalletResult<bool>;
}

// ---- payload helpers ----

fn str_field<'a>(payload: &'a Value, key: &str) -> WalletResult<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WalletError::DeviceResponseInvalid(format!("response is missing {}", key)))
}

fn hex_field(payload: &Value, key: &str) -> WalletResult<Vec<u8>> {
    let raw = str_field(payload, key)?;
    hex::decode(raw.trim_start_matches("0x"))
        .map_err(|_| WalletError::DeviceResponseInvalid(format!("{} is not hex", key)))
}

/// Ledger 消息签名返回 `{v, r, s}`
fn vrs_field(payload: &Value) -> WalletResult<(u8, Vec<u8>, Vec<u8>)> {
    let v = payload
        .get("v")
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| WalletError::DeviceResponseInvalid("response is missing v".into()))?;
    let r = hex_field(payload, "r")?;
    let s = hex_field(payload, "s")?;
    if r.len() != 32 || s.len() != 32 {
        return Err(WalletError::DeviceResponseInvalid(
            "r and s must be 32 bytes".into(),
        ));
    }
    Ok((v, r, s))
}

fn require_path(path: &Bip32Path) -> WalletResult<()> {
    if path.is_empty() {
        return Err(WalletError::InvalidRequest("derivation path is empty".into()));
    }
    Ok(())
}

fn to_args<T: Serialize>(value: &T) -> WalletResult<Value> {
    serde_json::to_value(value).map_err(|e| WalletError::InvalidRequest(e.to_string()))
}

// ---- facade ----

/// 绑定到一个传输通道的硬件钱包句柄
pub struct DeviceWallet {
    transport: Arc<dyn Transport>,
    caps: Capabilities,
    config: WalletConfig,
    device_lock: tokio::sync::Mutex<()>,
    cancel_token: parking_lot::Mutex<CancellationToken>,
}

impl DeviceWallet {
    /// 创建句柄, 能力集由厂商决定
    pub fn new(vendor: Vendor, transport: Arc<dyn Transport>, config: WalletConfig) -> Self {
        info!(%vendor, device = %transport.device_id(), "wallet handle created");
        Self {
            transport,
            caps: Capabilities::for_vendor(vendor),
            config,
            device_lock: tokio::sync::Mutex::new(()),
            cancel_token: parking_lot::Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_defaults(vendor: Vendor, transport: Arc<dyn Transport>) -> Self {
        Self::new(vendor, transport, WalletConfig::default())
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// 仅当厂商支持 BTC 系时可用
    pub fn btc(&self) -> Option<&dyn BtcWallet> {
        if self.caps.supports_btc() {
            Some(self)
        } else {
            None
        }
    }

    /// 仅当厂商支持以太坊时可用
    pub fn eth(&self) -> Option<&dyn EthWallet> {
        if self.caps.supports_eth() {
            Some(self)
        } else {
            None
        }
    }

    pub fn supports_debug_link(&self) -> bool {
        self.caps.supports_debug_link()
    }

    fn is_ledger(&self) -> bool {
        self.caps.vendor == Vendor::Ledger
    }

    fn unsupported(&self, op: &str) -> WalletError {
        WalletError::UnsupportedOperation(format!("{} does not support {}", self.caps.vendor, op))
    }

    /// 该厂商支持的 BTC 系币种
    fn supported_coin(&self, name: &str) -> WalletResult<&'static CoinInfo> {
        let info = catalog::coin(name)?;
        if !self.caps.supports_coin(info.name) {
            return Err(self.unsupported(info.name));
        }
        Ok(info)
    }

    /// xpub 导出也覆盖以太坊账户
    fn exportable_coin(&self, name: &str) -> WalletResult<&'static CoinInfo> {
        let info = catalog::coin(name)?;
        if !self.caps.supports_any_coin(info.name) {
            return Err(self.unsupported(info.name));
        }
        Ok(info)
    }

    /// 以独占方式执行 `op`
    ///
    /// 等待并发操作完成, 或在 `BusyPolicy::FailFast` 下直接拒绝;
    /// `cancel` 先触发时返回 `ActionCancelled`。
    async fn session<T, F>(&self, op: &'static str, fut: F) -> WalletResult<T>
    where
        F: Future<Output = WalletResult<T>> + Send,
        T: Send,
    {
        let _guard = match self.config.busy_policy {
            BusyPolicy::Queue => self.device_lock.lock().await,
            BusyPolicy::FailFast => self.device_lock.try_lock().map_err(|_| {
                warn!(vendor = %self.caps.vendor, op, "device busy");
                WalletError::device_failed("device busy", None)
            })?,
        };
        let token = self.cancel_token.lock().clone();

        info!(vendor = %self.caps.vendor, op, "device operation");
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!(vendor = %self.caps.vendor, op, "operation cancelled");
                Err(WalletError::ActionCancelled)
            }
            result = fut => result,
        }
    }

    /// 一次传输往返, 失败经翻译器处理
    async fn device_call(
        &self,
        namespace: &str,
        method: &str,
        coin: &str,
        message: &str,
        args: Value,
    ) -> WalletResult<Value> {
        debug!(namespace, method, coin, "transport call");
        let response = self.transport.call(namespace, method, args).await?;

        let ctx = CallContext {
            vendor: self.caps.vendor,
            coin,
            method,
            message,
        };
        match status::translate(self.transport.as_ref(), ctx, &response, self.config.emit_diagnostics) {
            Some(err) => Err(err),
            None => Ok(response.payload),
        }
    }

    async fn features(&self) -> WalletResult<Value> {
        self.device_call(DEVICE_NS, "getFeatures", DEVICE_NS, "Unable to read device features", json!({}))
            .await
    }

    /// Ledger 返回原始公钥, 由父子公钥重建 xpub
    async fn ledger_public_key(&self, req: &GetPublicKey, coin: &CoinInfo) -> WalletResult<PublicKey> {
        let path = req.address_n_list.prefix(3);
        let parent = path.parent();
        let last = path
            .last()
            .ok_or_else(|| WalletError::InvalidRequest("derivation path is empty".into()))?;
        let format = req
            .script_type
            .map(InputScriptType::address_format)
            .unwrap_or(AddressFormat::Legacy);
        let opts = |p: &Bip32Path| {
            json!({ "path": p.to_relative_string(), "verify": false, "format": format.as_str() })
        };
        let msg = "Unable to obtain public key from device.";

        let parent_payload = self
            .device_call(BTC_NS, "getWalletPublicKey", coin.name, msg, opts(&parent))
            .await?;
        let parent_key = hex_field(&parent_payload, "publicKey")?;

        let child_payload = self
            .device_call(BTC_NS, "getWalletPublicKey", coin.name, msg, opts(&path))
            .await?;
        let child_key = hex_field(&child_payload, "publicKey")?;
        let chain_code = hex_field(&child_payload, "chainCode")?;

        let version = match path.path.get(1) {
            Some(coin_type) => {
                let slip44 = coin_type & !HARDENED;
                catalog::coin_by_slip44(slip44)
                    .map(|c| c.xpub_version)
                    .ok_or_else(|| {
                        WalletError::DeviceResponseInvalid(format!(
                            "no xpub version for coin type {}",
                            slip44
                        ))
                    })?
            }
            None => coin.xpub_version,
        };

        let xpub = xpub::build_encoded(XpubParts {
            parent_public_key: &parent_key,
            child_public_key: &child_key,
            chain_code: &chain_code,
            version,
            depth: path.len() as u8,
            index: last & !HARDENED,
            hardened: is_hardened(last),
        })?;
        Ok(PublicKey { xpub })
    }

    /// Trezor/KeepKey 返回序列化的 xpub, 解码校验
    async fn native_public_key(&self, req: &GetPublicKey, coin: &CoinInfo) -> WalletResult<PublicKey> {
        let args = json!({
            "path": req.address_n_list.to_string(),
            "coin": coin.name,
            "scriptType": req.script_type,
            "showDisplay": req.show_display,
        });
        let payload = self
            .device_call(BTC_NS, "getPublicKey", coin.name, "Unable to obtain public key from device.", args)
            .await?;
        let encoded = str_field(&payload, "xpub")?;

        let decoded = ExtendedPublicKey::decode(encoded)?;
        if decoded.depth as usize != req.address_n_list.len() {
            return Err(WalletError::DeviceResponseInvalid(format!(
                "xpub depth {} does not match path {}",
                decoded.depth, req.address_n_list
            )));
        }
        Ok(PublicKey {
            xpub: encoded.to_string(),
        })
    }

    /// PIN, 口令与单词输入响应进行中操作的提示, 不经过设备锁
    async fn answer_prompt(&self, method: &str, args: Value) -> WalletResult<()> {
        if self.is_ledger() {
            return Err(self.unsupported(method));
        }
        self.device_call(DEVICE_NS, method, DEVICE_NS, "Unable to answer device prompt", args)
            .await
            .map(|_| ())
    }

    async fn device_command(&self, op: &'static str, method: &str, args: Value) -> WalletResult<()> {
        if self.is_ledger() {
            return Err(self.unsupported(op));
        }
        let message = format!("Unable to {}", op);
        self.session(op, async {
            self.device_call(DEVICE_NS, method, DEVICE_NS, &message, args)
                .await
                .map(|_| ())
        })
        .await
    }
}

#[async_trait]
impl HdWallet for DeviceWallet {
    fn get_vendor(&self) -> Vendor {
        self.caps.vendor
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn get_device_id(&self) -> String {
        self.transport.device_id()
    }

    async fn get_model(&self) -> WalletResult<String> {
        let method = if self.is_ledger() { "getDeviceInfo" } else { "getFeatures" };
        self.session("get_model", async {
            let payload = self
                .device_call(DEVICE_NS, method, DEVICE_NS, "Unable to read device model", json!({}))
                .await?;
            Ok(str_field(&payload, "model")?.to_string())
        })
        .await
    }

    async fn get_label(&self) -> WalletResult<String> {
        // Ledger devices carry no user label
        if self.is_ledger() {
            return Ok(String::new());
        }
        self.session("get_label", async {
            let features = self.features().await?;
            Ok(features
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string())
        })
        .await
    }

    async fn get_public_keys(&self, requests: &[GetPublicKey]) -> WalletResult<Vec<PublicKey>> {
        let mut planned = Vec::with_capacity(requests.len());
        for req in requests {
            require_path(&req.address_n_list)?;
            let coin = self.exportable_coin(req.coin.as_deref().unwrap_or("Bitcoin"))?;
            planned.push((req, coin));
        }

        self.session("get_public_keys", async {
            let mut keys = Vec::with_capacity(planned.len());
            for (req, coin) in &planned {
                let key = if self.is_ledger() {
                    self.ledger_public_key(req, coin).await?
                } else {
                    self.native_public_key(req, coin).await?
                };
                debug!(path = %req.address_n_list, coin = coin.name, "public key ready");
                keys.push(key);
            }
            Ok(keys)
        })
        .await
    }

    async fn initialize(&self) -> WalletResult<()> {
        if self.is_ledger() {
            return Ok(());
        }
        self.session("initialize", async {
            self.device_call(DEVICE_NS, "initialize", DEVICE_NS, "Unable to initialize device", json!({}))
                .await
                .map(|_| ())
        })
        .await
    }

    async fn ping(&self, msg: &str) -> WalletResult<String> {
        // no ping in the Ledger apps; echo locally
        if self.is_ledger() {
            return Ok(msg.to_string());
        }
        self.session("ping", async {
            let payload = self
                .device_call(DEVICE_NS, "ping", DEVICE_NS, "Unable to ping device", json!({ "msg": msg }))
                .await?;
            Ok(str_field(&payload, "msg")?.to_string())
        })
        .await
    }

    async fn is_locked(&self) -> WalletResult<bool> {
        // the Ledger app protocol cannot report lock state
        if self.is_ledger() {
            return Ok(true);
        }
        self.session("is_locked", async {
            let f = self.features().await?;
            let flag = |k: &str| f.get(k).and_then(Value::as_bool).unwrap_or(false);
            Ok((flag("pinProtection") && !flag("pinCached"))
                || (flag("passphraseProtection") && !flag("passphraseCached")))
        })
        .await
    }

    async fn clear_session(&self) -> WalletResult<()> {
        if self.is_ledger() {
            return Ok(());
        }
        self.device_command("clear session", "clearSession", json!({})).await
    }

    async fn send_pin(&self, pin: &str) -> WalletResult<()> {
        if pin.is_empty() || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(WalletError::InvalidRequest("PIN must be digits".into()));
        }
        self.answer_prompt("sendPin", json!({ "pin": pin })).await
    }

    async fn send_passphrase(&self, passphrase: &str) -> WalletResult<()> {
        self.answer_prompt("sendPassphrase", json!({ "passphrase": passphrase }))
            .await
    }

    async fn send_character(&self, character: &str) -> WalletResult<()> {
        if character.chars().count() != 1 {
            return Err(WalletError::InvalidRequest(
                "exactly one character expected".into(),
            ));
        }
        self.answer_prompt("sendCharacter", json!({ "character": character }))
            .await
    }

    async fn send_word(&self, word: &str) -> WalletResult<()> {
        if word.trim().is_empty() {
            return Err(WalletError::InvalidRequest("word is empty".into()));
        }
        self.answer_prompt("sendWord", json!({ "word": word.trim() })).await
    }

    async fn cancel(&self) -> WalletResult<()> {
        let previous = std::mem::replace(&mut *self.cancel_token.lock(), CancellationToken::new());
        info!(vendor = %self.caps.vendor, "cancelling in-flight operation");
        previous.cancel();
        self.transport.cancel().await
    }

    async fn wipe(&self) -> WalletResult<()> {
        self.device_command("wipe", "wipe", json!({})).await
    }

    async fn reset(&self, request: &ResetDevice) -> WalletResult<()> {
        check_entropy(request.entropy)?;
        self.device_command("reset", "reset", to_args(request)?).await
    }

    async fn recover(&self, request: &RecoverDevice) -> WalletResult<()> {
        check_entropy(request.entropy)?;
        self.device_command("recover", "recover", to_args(request)?).await
    }

    async fn load_device(&self, request: &LoadDevice) -> WalletResult<()> {
        request.validate()?;
        self.device_command("load device", "loadDevice", to_args(request)?)
            .await
    }
}

#[async_trait]
impl BtcWallet for DeviceWallet {
    async fn btc_get_address(&self, request: &BtcGetAddress) -> WalletResult<String> {
        require_path(&request.address_n_list)?;
        let coin = self.supported_coin(&request.coin)?;
        if let Some(st) = request.script_type {
            if !self.caps.supports_script_type(coin.name, st) {
                return Err(self.unsupported(&format!("{:?} on {}", st, coin.name)));
            }
        }

        self.session("btc_get_address", async {
            let msg = "Unable to obtain address from device.";
            let address = if self.is_ledger() {
                let format = request
                    .script_type
                    .map(InputScriptType::address_format)
                    .unwrap_or(AddressFormat::Legacy);
                let args = json!({
                    "path": request.address_n_list.to_relative_string(),
                    "verify": request.show_display,
                    "format": format.as_str(),
                });
                let payload = self
                    .device_call(BTC_NS, "getWalletPublicKey", coin.name, msg, args)
                    .await?;
                str_field(&payload, "bitcoinAddress")?.to_string()
            } else {
                let args = json!({
                    "path": request.address_n_list.to_string(),
                    "coin": coin.name,
                    "scriptType": request.script_type,
                    "showDisplay": request.show_display,
                });
                let payload = self.device_call(BTC_NS, "getAddress", coin.name, msg, args).await?;
                str_field(&payload, "address")?.to_string()
            };
            Ok(address)
        })
        .await
    }

    async fn btc_sign_tx(&self, tx: &UnsignedTx) -> WalletResult<SignedTx> {
        tx.validate(&self.caps)?;
        let args = to_args(tx)?;
        let coin = self.supported_coin(&tx.coin)?;

        self.session("btc_sign_tx", async {
            info!(
                coin = coin.name,
                inputs = tx.inputs.len(),
                outputs = tx.outputs.len(),
                "signing transaction"
            );
            let payload = self
                .device_call(BTC_NS, "signTx", coin.name, "Unable to sign transaction.", args)
                .await?;
            SignedTx::from_payload(&payload, tx.inputs.len())
        })
        .await
    }

    async fn btc_sign_message(&self, request: &BtcSignMessage) -> WalletResult<SignedMessage> {
        require_path(&request.address_n_list)?;
        let coin = self.supported_coin(request.coin.as_deref().unwrap_or("Bitcoin"))?;
        let message_hex = hex::encode(request.message.as_bytes());

        self.session("btc_sign_message", async {
            let msg = "Could not sign message with device.";
            if !self.is_ledger() {
                let args = json!({
                    "path": request.address_n_list.to_string(),
                    "coin": coin.name,
                    "scriptType": request.script_type,
                    "message": request.message,
                });
                let payload = self.device_call(BTC_NS, "signMessage", coin.name, msg, args).await?;
                return Ok(SignedMessage {
                    address: str_field(&payload, "address")?.to_string(),
                    signature: str_field(&payload, "signature")?.to_string(),
                });
            }

            let path = request.address_n_list.to_relative_string();
            let payload = self
                .device_call(
                    BTC_NS,
                    "signMessageNew",
                    coin.name,
                    msg,
                    json!({ "path": path, "messageHex": message_hex }),
                )
                .await?;
            let (v, r, s) = vrs_field(&payload)?;
            if v > 3 {
                return Err(WalletError::DeviceResponseInvalid(format!("recovery id {} out of range", v)));
            }
            let mut raw = Vec::with_capacity(65);
            // compressed-key header
            raw.push(v + 31);
            raw.extend_from_slice(&r);
            raw.extend_from_slice(&s);

            let format = request
                .script_type
                .map(InputScriptType::address_format)
                .unwrap_or(AddressFormat::Legacy);
            let addr_payload = self
                .device_call(
                    BTC_NS,
                    "getWalletPublicKey",
                    coin.name,
                    msg,
                    json!({ "path": path, "verify": false, "format": format.as_str() }),
                )
                .await?;
            Ok(SignedMessage {
                address: str_field(&addr_payload, "bitcoinAddress")?.to_string(),
                signature: hex::encode(raw),
            })
        })
        .await
    }

    async fn btc_verify_message(&self, request: &BtcVerifyMessage) -> WalletResult<bool> {
        message::verify_bitcoin_message(
            &request.coin,
            &request.address,
            request.message.as_bytes(),
            &request.signature,
        )
    }
}

#[async_trait]
impl EthWallet for DeviceWallet {
    async fn eth_get_address(&self, request: &EthGetAddress) -> WalletResult<String> {
        require_path(&request.address_n_list)?;
        let (method, args) = if self.is_ledger() {
            (
                "getAddress",
                json!({ "path": request.address_n_list.to_relative_string(), "display": request.show_display }),
            )
        } else {
            (
                "ethereumGetAddress",
                json!({ "path": request.address_n_list.to_string(), "showDisplay": request.show_display }),
            )
        };

        self.session("eth_get_address", async {
            let payload = self
                .device_call(ETH_NS, method, "Ethereum", "Unable to obtain ETH address from device.", args)
                .await?;
            let address = str_field(&payload, "address")?;
            if !is_eth_address(address) {
                return Err(WalletError::DeviceResponseInvalid(format!(
                    "malformed address {}",
                    address
                )));
            }
            Ok(address.to_string())
        })
        .await
    }

    async fn eth_sign_tx(&self, tx: &EthSignTx) -> WalletResult<EthSignedTx> {
        tx.validate()?;
        let args = to_args(tx)?;
        let method = if self.is_ledger() { "signTransaction" } else { "ethereumSignTx" };

        self.session("eth_sign_tx", async {
            info!(chain_id = tx.chain_id, "signing ETH transaction");
            let payload = self
                .device_call(ETH_NS, method, "Ethereum", "Unable to sign ETH transaction.", args)
                .await?;
            EthSignedTx::from_payload(&payload)
        })
        .await
    }

    async fn eth_sign_message(&self, request: &EthSignMessage) -> WalletResult<SignedMessage> {
        require_path(&request.address_n_list)?;

        self.session("eth_sign_message", async {
            let msg = "Unable to sign ETH message.";
            if !self.is_ledger() {
                let args = json!({
                    "path": request.address_n_list.to_string(),
                    "message": request.message,
                });
                let payload = self
                    .device_call(ETH_NS, "ethereumSignMessage", "Ethereum", msg, args)
                    .await?;
                return Ok(SignedMessage {
                    address: str_field(&payload, "address")?.to_string(),
                    signature: str_field(&payload, "signature")?.to_string(),
                });
            }

            let path = request.address_n_list.to_relative_string();
            let args = json!({ "path": path, "messageHex": hex::encode(request.message.as_bytes()) });
            let payload = self
                .device_call(ETH_NS, "signPersonalMessage", "Ethereum", msg, args)
                .await?;
            let (v, r, s) = vrs_field(&payload)?;

            let addr_payload = self
                .device_call(ETH_NS, "getAddress", "Ethereum", msg, json!({ "path": path, "display": false }))
                .await?;
            Ok(SignedMessage {
                address: str_field(&addr_payload, "address")?.to_string(),
                signature: format!("0x{}{}{:02x}", hex::encode(r), hex::encode(s), v),
            })
        })
        .await
    }

    async fn eth_verify_message(&self, request: &EthVerifyMessage) -> WalletResult<bool> {
        message::verify_eth_message(&request.address, request.message.as_bytes(), &request.signature)
    }
}
