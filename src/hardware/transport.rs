//! 传输层抽象
//!
//! 字节级封帧 (HID, WebUSB, U2F) 都在这个 trait 之后。钱包层只看到
//! `call(namespace, method, args)` 和 JSON 形式的响应。

use crate::core::errors::WalletError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一次传输往返的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportResponse {
    pub success: bool,
    /// Coin the call was made for, when the vendor reports it
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub payload: Value,
}

impl TransportResponse {
    /// 成功响应
    pub fn ok(method: impl Into<String>, payload: Value) -> Self {
        Self {
            success: true,
            coin: None,
            method: method.into(),
            payload,
        }
    }

    /// 厂商拒绝 (`success == false`)
    pub fn failed(method: impl Into<String>, payload: Value) -> Self {
        Self {
            success: false,
            coin: None,
            method: method.into(),
            payload,
        }
    }

    /// 附带厂商报告的币种
    pub fn with_coin(mut self, coin: impl Into<String>) -> Self {
        self.coin = Some(coin.into());
        self
    }
}

/// 推送给传输层监听者的诊断事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub message_type: String,
    pub from_wallet: bool,
    pub message: String,
}

impl DeviceEvent {
    /// 钱包层产生的错误事件
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message_type: "ERROR".to_string(),
            from_wallet: true,
            message: message.into(),
        }
    }
}

/// 钱包外观层使用的厂商传输契约
#[async_trait]
pub trait Transport: Send + Sync {
    /// 已连接设备的稳定标识
    fn device_id(&self) -> String;

    /// 一次请求/响应交换。`Err` 只表示链路层故障;
    /// 厂商拒绝以 `success == false` 返回。
    async fn call(
        &self,
        namespace: &str,
        method: &str,
        args: Value,
    ) -> Result<TransportResponse, WalletError>;

    /// 请求设备中止当前操作
    async fn cancel(&self) -> Result<(), WalletError>;

    /// 尽力而为的事件出口; 不得失败
    fn emit(&self, _topic: &str, _event: DeviceEvent) {}
}
