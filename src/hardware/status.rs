//! 厂商错误翻译
//!
//! 每个失败的传输调用恰好经过一次 [`translate`], 输出 [`WalletError`] 的一个成员。
//! 无法识别的输入不会 panic, 统一落到 `DeviceOperationFailed`。

use super::capabilities::Vendor;
use super::transport::{DeviceEvent, Transport, TransportResponse};
use crate::core::errors::WalletError;
use serde_json::Value;
use tracing::warn;

/// APDU 状态字
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWord(pub u16);

impl StatusWord {
    pub const OK: StatusWord = StatusWord(0x9000);
    pub const WRONG_LENGTH: StatusWord = StatusWord(0x6700);
    pub const SECURITY_STATUS: StatusWord = StatusWord(0x6982);
    pub const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord(0x6985);
    pub const INCORRECT_DATA: StatusWord = StatusWord(0x6A80);
    pub const FILE_NOT_FOUND: StatusWord = StatusWord(0x6A82);
    pub const INCORRECT_P1_P2: StatusWord = StatusWord(0x6B00);
    pub const INS_NOT_SUPPORTED: StatusWord = StatusWord(0x6D00);
    pub const CLA_NOT_SUPPORTED: StatusWord = StatusWord(0x6E00);
    pub const UNKNOWN: StatusWord = StatusWord(0x6F00);

    pub fn from_bytes(sw1: u8, sw2: u8) -> Self {
        StatusWord(((sw1 as u16) << 8) | sw2 as u16)
    }

    /// 厂商字符串中所有 `0xNNNN`, 不区分大小写, 按出现顺序。
    /// 更长的十六进制串取前四位。
    pub fn scan(text: &str) -> Vec<Self> {
        let lower = text.to_ascii_lowercase();
        let mut found = Vec::new();
        let mut rest = lower.as_str();
        while let Some(pos) = rest.find("0x") {
            rest = &rest[pos + 2..];
            let digits: String = rest.chars().take(4).collect();
            if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
                if let Ok(code) = u16::from_str_radix(&digits, 16) {
                    found.push(StatusWord(code));
                }
            }
        }
        found
    }

    /// 厂商字符串中的第一个状态字
    pub fn find_in(text: &str) -> Option<Self> {
        Self::scan(text).into_iter().next()
    }

    pub fn is_success(self) -> bool {
        self == Self::OK
    }

    pub fn description(self) -> String {
        match self {
            Self::OK => "success".to_string(),
            Self::SECURITY_STATUS => "security status not satisfied".to_string(),
            Self::CONDITIONS_NOT_SATISFIED => "conditions of use not satisfied".to_string(),
            Self::INCORRECT_DATA => "incorrect data".to_string(),
            Self::FILE_NOT_FOUND => "file not found".to_string(),
            Self::INS_NOT_SUPPORTED => "instruction not supported".to_string(),
            Self::CLA_NOT_SUPPORTED => "class not supported".to_string(),
            Self::UNKNOWN => "unknown error".to_string(),
            Self::WRONG_LENGTH => "wrong length".to_string(),
            Self::INCORRECT_P1_P2 => "incorrect parameters".to_string(),
            other => format!("unknown status {:#06x}", other.0),
        }
    }
}

/// 失败调用的上下文, 用于生成错误和诊断事件
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub vendor: Vendor,
    pub coin: &'a str,
    pub method: &'a str,
    /// Human-readable summary of what was being attempted
    pub message: &'a str,
}

/// 从失败载荷中取出厂商诊断信息
///
/// 支持 `{"error": "..."}`, `{"error": 27013}`, `{"statusCode": ...}`,
/// `{"code": "Failure_..."}` 以及纯字符串。
pub fn raw_payload(payload: &Value) -> Option<String> {
    fn render(v: &Value) -> Option<String> {
        match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => n.as_u64().map(|code| format!("{:#06x}", code)),
            _ => None,
        }
    }

    match payload {
        Value::Object(map) => ["error", "statusCode", "code", "message"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(render),
        other => render(other),
    }
}

/// 把厂商载荷归类到统一错误分类
pub fn classify(vendor: Vendor, coin: &str, message: &str, raw: Option<String>) -> WalletError {
    let Some(raw) = raw else {
        return WalletError::device_failed(message, None);
    };

    match vendor {
        Vendor::Ledger => {
            let words = StatusWord::scan(&raw);
            let has = |sw: StatusWord| words.contains(&sw);
            // 按优先级匹配, 不看出现顺序
            if has(StatusWord::WRONG_LENGTH) || has(StatusWord::SECURITY_STATUS) {
                WalletError::SelectApp {
                    vendor: vendor.name().to_string(),
                    coin: coin.to_string(),
                }
            } else if has(StatusWord::INS_NOT_SUPPORTED) {
                WalletError::WrongApp {
                    vendor: vendor.name().to_string(),
                    coin: coin.to_string(),
                }
            } else if has(StatusWord::CONDITIONS_NOT_SATISFIED) {
                WalletError::ActionCancelled
            } else if let Some(sw) = words.first() {
                WalletError::device_failed(format!("{}: {}", message, sw.description()), Some(raw))
            } else {
                WalletError::device_failed(message, Some(raw))
            }
        }
        Vendor::Trezor | Vendor::KeepKey => {
            if raw.contains("Failure_ActionCancelled") || raw.contains("Failure_PinCancelled") {
                WalletError::ActionCancelled
            } else {
                WalletError::device_failed(message, Some(raw))
            }
        }
    }
}

/// 翻译失败响应, 先发出诊断事件
///
/// 成功响应返回 `None`。
pub fn translate(
    transport: &dyn Transport,
    ctx: CallContext<'_>,
    response: &TransportResponse,
    emit_diagnostics: bool,
) -> Option<WalletError> {
    if response.success {
        return None;
    }

    let coin = response.coin.as_deref().unwrap_or(ctx.coin);
    let raw = raw_payload(&response.payload);
    let error = classify(ctx.vendor, coin, ctx.message, raw);

    if let WalletError::DeviceOperationFailed { payload, .. } = &error {
        warn!(
            vendor = %ctx.vendor,
            coin,
            method = ctx.method,
            payload = payload.as_deref().unwrap_or(""),
            "{}",
            ctx.message
        );
        if emit_diagnostics {
            let topic = format!(
                "{}.{}.{}.call",
                ctx.vendor.name().to_ascii_lowercase(),
                coin,
                ctx.method
            );
            transport.emit(&topic, DeviceEvent::error(ctx.message));
        }
    }

    Some(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn ledger(raw: &str) -> WalletError {
        classify(Vendor::Ledger, "Bitcoin", "Unable to obtain public key", Some(raw.to_string()))
    }

    #[test_case("0x6700" ; "wrong length means no app")]
    #[test_case("0x6982" ; "security status means no app")]
    #[test_case("Ledger device: UNKNOWN_ERROR (0x6982)" ; "embedded code")]
    fn test_select_app(raw: &str) {
        assert_eq!(
            ledger(raw),
            WalletError::SelectApp {
                vendor: "Ledger".into(),
                coin: "Bitcoin".into()
            }
        );
    }

    #[test_case("0x6d00")]
    #[test_case("0x6D00")]
    fn test_wrong_app(raw: &str) {
        assert!(matches!(ledger(raw), WalletError::WrongApp { .. }));
    }

    #[test]
    fn test_user_rejected() {
        assert_eq!(ledger("0x6985"), WalletError::ActionCancelled);
    }

    #[test_case("TransportStatusError 0x6a80 (wrapped 0x6985)" ; "known code after unknown one")]
    #[test_case("status 0x69851" ; "longer hex run")]
    fn test_known_code_anywhere_wins(raw: &str) {
        assert_eq!(ledger(raw), WalletError::ActionCancelled);
    }

    #[test]
    fn test_priority_order() {
        assert!(matches!(ledger("0x6985 then 0x6d00"), WalletError::WrongApp { .. }));
        assert!(matches!(ledger("0x6d00 then 0x6700"), WalletError::SelectApp { .. }));
    }

    #[test]
    fn test_unrecognized_preserves_raw() {
        let err = ledger("something odd happened");
        assert_eq!(err.raw_payload(), Some("something odd happened"));

        let err = ledger("0x6a80");
        assert_eq!(err.raw_payload(), Some("0x6a80"));
        assert!(err.to_string().contains("incorrect data"));
    }

    #[test]
    fn test_no_payload() {
        let err = classify(Vendor::Ledger, "Bitcoin", "Unable to sign", None);
        assert_eq!(err, WalletError::device_failed("Unable to sign", None));
    }

    #[test]
    fn test_trezor_cancel_codes() {
        let raw = Some("Failure_ActionCancelled".to_string());
        assert_eq!(classify(Vendor::Trezor, "Bitcoin", "x", raw), WalletError::ActionCancelled);

        let raw = Some("Failure_PinCancelled".to_string());
        assert_eq!(classify(Vendor::KeepKey, "Bitcoin", "x", raw), WalletError::ActionCancelled);

        // APDU codes mean nothing to protobuf firmware
        let raw = Some("0x6985".to_string());
        assert!(matches!(
            classify(Vendor::Trezor, "Bitcoin", "x", raw),
            WalletError::DeviceOperationFailed { .. }
        ));
    }

    #[test]
    fn test_raw_payload_shapes() {
        assert_eq!(raw_payload(&json!({"error": "0x6985"})), Some("0x6985".into()));
        assert_eq!(raw_payload(&json!({"error": 27013})), Some("0x6985".into()));
        assert_eq!(raw_payload(&json!({"statusCode": 27904})), Some("0x6d00".into()));
        assert_eq!(
            raw_payload(&json!({"code": "Failure_ActionCancelled", "message": "Cancelled"})),
            Some("Failure_ActionCancelled".into())
        );
        assert_eq!(raw_payload(&json!("0x6700")), Some("0x6700".into()));
        assert_eq!(raw_payload(&json!({})), None);
        assert_eq!(raw_payload(&Value::Null), None);
    }

    #[test]
    fn test_status_word_scan() {
        assert_eq!(StatusWord::find_in("err 0x6D00!"), Some(StatusWord::INS_NOT_SUPPORTED));
        assert_eq!(StatusWord::find_in("0x12 then 0x6985"), Some(StatusWord::CONDITIONS_NOT_SATISFIED));
        assert_eq!(StatusWord::find_in("0x123456"), Some(StatusWord(0x1234)));
        assert_eq!(StatusWord::find_in("0x12"), None);
        assert_eq!(
            StatusWord::scan("0x6a80 (wrapped 0X6985)"),
            vec![StatusWord::INCORRECT_DATA, StatusWord::CONDITIONS_NOT_SATISFIED]
        );
        assert_eq!(StatusWord::find_in("no code"), None);
        assert_eq!(StatusWord::from_bytes(0x90, 0x00), StatusWord::OK);
        assert!(StatusWord::OK.is_success());
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(StatusWord::SECURITY_STATUS.description(), "security status not satisfied");
        assert_eq!(StatusWord(0xABCD).description(), "unknown status 0xabcd");
    }
}
