//! 路径/脚本目录
//!
//! 每个币种的静态表: 网络参数, 以及按优先级排列的 (脚本类型, 路径模板)。

use crate::core::errors::WalletError;
use serde::{Deserialize, Serialize};

/// 输入脚本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputScriptType {
    /// Bitcoin Cash address encoding
    CashAddr,
    SpendAddress,
    SpendMultisig,
    External,
    SpendWitness,
    SpendP2SHWitness,
}

impl InputScriptType {
    pub const ALL: [InputScriptType; 6] = [
        InputScriptType::CashAddr,
        InputScriptType::SpendAddress,
        InputScriptType::SpendMultisig,
        InputScriptType::External,
        InputScriptType::SpendWitness,
        InputScriptType::SpendP2SHWitness,
    ];

    /// 隔离见证输入对金额签名, 不需要前序交易
    pub fn is_witness(self) -> bool {
        matches!(
            self,
            InputScriptType::SpendWitness | InputScriptType::SpendP2SHWitness
        )
    }

    /// 对应的地址编码
    pub fn address_format(self) -> AddressFormat {
        match self {
            InputScriptType::CashAddr => AddressFormat::CashAddr,
            InputScriptType::SpendAddress | InputScriptType::External => AddressFormat::Legacy,
            InputScriptType::SpendMultisig | InputScriptType::SpendP2SHWitness => {
                AddressFormat::P2sh
            }
            InputScriptType::SpendWitness => AddressFormat::Bech32,
        }
    }
}

/// 输出脚本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputScriptType {
    PayToAddress,
    PayToMultisig,
    PayToWitness,
    PayToP2SHWitness,
}

/// 地址编码, 命名与 Ledger BTC 应用的 `format` 参数一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    Legacy,
    P2sh,
    Bech32,
    CashAddr,
}

impl AddressFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressFormat::Legacy => "legacy",
            AddressFormat::P2sh => "p2sh",
            AddressFormat::Bech32 => "bech32",
            AddressFormat::CashAddr => "cashaddr",
        }
    }
}

/// 币族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoinFamily {
    Bitcoin,
    Ethereum,
}

/// 账户派生方式: `purpose'/coin_type'/account'`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptPreference {
    pub script_type: InputScriptType,
    pub purpose: u32,
    pub coin_type: u32,
}

const fn pref(script_type: InputScriptType, purpose: u32, coin_type: u32) -> ScriptPreference {
    ScriptPreference {
        script_type,
        purpose,
        coin_type,
    }
}

/// 单个币种的网络参数与路径偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinInfo {
    pub name: &'static str,
    pub symbol: &'static str,
    pub family: CoinFamily,
    /// SLIP-44 coin type
    pub slip44: u32,
    /// BIP32 public version bytes
    pub xpub_version: u32,
    pub p2pkh_version: Option<u8>,
    pub p2sh_version: Option<u8>,
    /// 原生隔离见证地址前缀 (bech32 HRP)
    pub bech32_hrp: Option<&'static str>,
    pub segwit: bool,
    pub preferences: &'static [ScriptPreference],
}

impl CoinInfo {
    pub fn supports_script_type(&self, script_type: InputScriptType) -> bool {
        self.preferences.iter().any(|p| p.script_type == script_type)
    }
}

use InputScriptType::{CashAddr, SpendAddress, SpendP2SHWitness, SpendWitness};

static COINS: &[CoinInfo] = &[
    CoinInfo {
        name: "Bitcoin",
        symbol: "BTC",
        family: CoinFamily::Bitcoin,
        slip44: 0,
        xpub_version: 0x0488_B21E,
        p2pkh_version: Some(0x00),
        p2sh_version: Some(0x05),
        bech32_hrp: Some("bc"),
        segwit: true,
        preferences: &[
            pref(SpendP2SHWitness, 49, 0),
            pref(SpendAddress, 44, 0),
            pref(SpendWitness, 84, 0),
        ],
    },
    CoinInfo {
        name: "Testnet",
        symbol: "TEST",
        family: CoinFamily::Bitcoin,
        slip44: 1,
        xpub_version: 0x0435_87CF,
        p2pkh_version: Some(0x6F),
        p2sh_version: Some(0xC4),
        bech32_hrp: Some("tb"),
        segwit: true,
        preferences: &[
            pref(SpendP2SHWitness, 49, 1),
            pref(SpendAddress, 44, 1),
            pref(SpendWitness, 84, 1),
        ],
    },
    CoinInfo {
        name: "BitcoinCash",
        symbol: "BCH",
        family: CoinFamily::Bitcoin,
        slip44: 145,
        xpub_version: 0x0488_B21E,
        p2pkh_version: Some(0x00),
        p2sh_version: Some(0x05),
        bech32_hrp: None,
        segwit: false,
        preferences: &[
            pref(CashAddr, 44, 145),
            pref(SpendAddress, 44, 145),
            pref(SpendAddress, 44, 0),
        ],
    },
    CoinInfo {
        name: "BitcoinSV",
        symbol: "BSV",
        family: CoinFamily::Bitcoin,
        slip44: 236,
        xpub_version: 0x0488_B21E,
        p2pkh_version: Some(0x00),
        p2sh_version: Some(0x05),
        bech32_hrp: None,
        segwit: false,
        // one account, three fork conventions
        preferences: &[
            pref(SpendAddress, 44, 236),
            pref(SpendAddress, 44, 145),
            pref(SpendAddress, 44, 0),
        ],
    },
    CoinInfo {
        name: "BitcoinGold",
        symbol: "BTG",
        family: CoinFamily::Bitcoin,
        slip44: 156,
        xpub_version: 0x0488_B21E,
        p2pkh_version: Some(0x26),
        p2sh_version: Some(0x17),
        bech32_hrp: Some("btg"),
        segwit: true,
        preferences: &[
            pref(SpendP2SHWitness, 49, 156),
            pref(SpendAddress, 44, 156),
            pref(SpendWitness, 84, 156),
        ],
    },
    CoinInfo {
        name: "Litecoin",
        symbol: "LTC",
        family: CoinFamily::Bitcoin,
        slip44: 2,
        xpub_version: 0x019D_A462,
        p2pkh_version: Some(0x30),
        p2sh_version: Some(0x32),
        bech32_hrp: Some("ltc"),
        segwit: true,
        preferences: &[
            pref(SpendP2SHWitness, 49, 2),
            pref(SpendAddress, 44, 2),
            pref(SpendWitness, 84, 2),
        ],
    },
    CoinInfo {
        name: "Dogecoin",
        symbol: "DOGE",
        family: CoinFamily::Bitcoin,
        slip44: 3,
        xpub_version: 0x02FA_CAFD,
        p2pkh_version: Some(0x1E),
        p2sh_version: Some(0x16),
        bech32_hrp: None,
        segwit: false,
        preferences: &[pref(SpendAddress, 44, 3)],
    },
    CoinInfo {
        name: "Dash",
        symbol: "DASH",
        family: CoinFamily::Bitcoin,
        slip44: 5,
        xpub_version: 0x0488_B21E,
        p2pkh_version: Some(0x4C),
        p2sh_version: Some(0x10),
        bech32_hrp: None,
        segwit: false,
        preferences: &[pref(SpendAddress, 44, 5)],
    },
    CoinInfo {
        name: "Ethereum",
        symbol: "ETH",
        family: CoinFamily::Ethereum,
        slip44: 60,
        xpub_version: 0x0488_B21E,
        p2pkh_version: None,
        p2sh_version: None,
        bech32_hrp: None,
        segwit: false,
        preferences: &[],
    },
];

/// 全部已登记币种 (目录顺序)
pub fn coins() -> &'static [CoinInfo] {
    COINS
}

/// 按名称或代码查找, 不区分大小写
pub fn coin(name: &str) -> Result<&'static CoinInfo, WalletError> {
    let name = name.trim();
    COINS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name) || c.symbol.eq_ignore_ascii_case(name))
        .ok_or_else(|| WalletError::UnknownCoin(name.to_string()))
}

/// 按 SLIP-44 编号查找
pub fn coin_by_slip44(slip44: u32) -> Option<&'static CoinInfo> {
    COINS.iter().find(|c| c.slip44 == slip44)
}

/// BTC 系币种的 (脚本类型, 模板) 偏好列表
pub fn preferences_for(name: &str) -> Result<&'static [ScriptPreference], WalletError> {
    Ok(coin(name)?.preferences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(coin("bitcoin").unwrap().name, "Bitcoin");
        assert_eq!(coin("LTC").unwrap().name, "Litecoin");
        assert_eq!(coin(" BitcoinCash ").unwrap().slip44, 145);
    }

    #[test]
    fn test_unknown_coin() {
        assert_eq!(
            coin("Zcash").unwrap_err(),
            WalletError::UnknownCoin("Zcash".into())
        );
        assert!(preferences_for("NotACoin").is_err());
    }

    #[test]
    fn test_segwit_coin_prefers_wrapped_segwit() {
        let prefs = preferences_for("Bitcoin").unwrap();
        assert_eq!(prefs[0], pref(SpendP2SHWitness, 49, 0));
        assert_eq!(prefs[1], pref(SpendAddress, 44, 0));
    }

    #[test]
    fn test_slip44_unique() {
        for c in coins() {
            assert_eq!(coin_by_slip44(c.slip44).unwrap().name, c.name);
        }
        assert!(coin_by_slip44(9999).is_none());
    }

    #[test]
    fn test_segwit_flag_matches_preferences() {
        for c in coins() {
            let has_witness = c.preferences.iter().any(|p| p.script_type.is_witness());
            assert_eq!(has_witness, c.segwit, "{}", c.name);
        }
    }

    #[test]
    fn test_bech32_only_for_segwit_coins() {
        for c in coins() {
            assert_eq!(c.bech32_hrp.is_some(), c.segwit, "{}", c.name);
        }
        assert_eq!(coin("Litecoin").unwrap().bech32_hrp, Some("ltc"));
    }

    #[test]
    fn test_address_formats() {
        assert_eq!(SpendAddress.address_format().as_str(), "legacy");
        assert_eq!(SpendP2SHWitness.address_format().as_str(), "p2sh");
        assert_eq!(SpendWitness.address_format().as_str(), "bech32");
        assert_eq!(CashAddr.address_format().as_str(), "cashaddr");
    }
}
