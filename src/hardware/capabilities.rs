//! 能力协商
//!
//! 按厂商静态回答 "设备能否做 X", 在任何传输调用之前查询。未列出即不支持。

use super::catalog::{self, CoinFamily, CoinInfo, InputScriptType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// 设备厂商, 创建钱包句柄时确定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Ledger,
    Trezor,
    KeepKey,
}

impl Vendor {
    pub fn name(self) -> &'static str {
        match self {
            Vendor::Ledger => "Ledger",
            Vendor::Trezor => "Trezor",
            Vendor::KeepKey => "KeepKey",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 句柄暴露的币族接口位掩码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CoinFamilies(u8);

impl CoinFamilies {
    pub const NONE: CoinFamilies = CoinFamilies(0);
    pub const BTC: CoinFamilies = CoinFamilies(1 << 0);
    pub const ETH: CoinFamilies = CoinFamilies(1 << 1);
    pub const DEBUG_LINK: CoinFamilies = CoinFamilies(1 << 2);

    pub fn contains(self, other: CoinFamilies) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for CoinFamilies {
    type Output = CoinFamilies;

    fn bitor(self, rhs: CoinFamilies) -> CoinFamilies {
        CoinFamilies(self.0 | rhs.0)
    }
}

/// 钱包句柄携带的能力集
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub vendor: Vendor,
    pub families: CoinFamilies,
    coins: &'static [&'static str],
    script_types: &'static [InputScriptType],
    secure_transfer: bool,
    native_exchange: bool,
    on_device_pin_entry: bool,
    on_device_passphrase: bool,
    on_device_display: bool,
    on_device_recovery: bool,
}

use InputScriptType::{CashAddr, External, SpendAddress, SpendMultisig, SpendP2SHWitness, SpendWitness};

const LEDGER: Capabilities = Capabilities {
    vendor: Vendor::Ledger,
    families: CoinFamilies(CoinFamilies::BTC.0 | CoinFamilies::ETH.0),
    coins: &[
        "Bitcoin",
        "Testnet",
        "BitcoinCash",
        "BitcoinGold",
        "Litecoin",
        "Dogecoin",
        "Dash",
        "Ethereum",
    ],
    script_types: &[CashAddr, SpendAddress, SpendWitness, SpendP2SHWitness],
    secure_transfer: false,
    native_exchange: false,
    on_device_pin_entry: true,
    on_device_passphrase: true,
    on_device_display: true,
    on_device_recovery: true,
};

const TREZOR: Capabilities = Capabilities {
    vendor: Vendor::Trezor,
    families: CoinFamilies(CoinFamilies::BTC.0 | CoinFamilies::ETH.0 | CoinFamilies::DEBUG_LINK.0),
    coins: &[
        "Bitcoin",
        "Testnet",
        "BitcoinCash",
        "BitcoinGold",
        "Litecoin",
        "Dogecoin",
        "Dash",
        "Ethereum",
    ],
    script_types: &[
        SpendAddress,
        SpendMultisig,
        External,
        SpendWitness,
        SpendP2SHWitness,
    ],
    secure_transfer: false,
    native_exchange: false,
    on_device_pin_entry: false,
    on_device_passphrase: false,
    on_device_display: true,
    on_device_recovery: false,
};

const KEEPKEY: Capabilities = Capabilities {
    vendor: Vendor::KeepKey,
    families: CoinFamilies(CoinFamilies::BTC.0 | CoinFamilies::ETH.0 | CoinFamilies::DEBUG_LINK.0),
    coins: &[
        "Bitcoin",
        "Testnet",
        "BitcoinCash",
        "BitcoinSV",
        "BitcoinGold",
        "Litecoin",
        "Dogecoin",
        "Dash",
        "Ethereum",
    ],
    script_types: &[
        SpendAddress,
        SpendMultisig,
        External,
        SpendWitness,
        SpendP2SHWitness,
    ],
    secure_transfer: true,
    native_exchange: true,
    on_device_pin_entry: false,
    on_device_passphrase: false,
    on_device_display: true,
    on_device_recovery: false,
};

impl Capabilities {
    /// 厂商的静态能力表
    pub fn for_vendor(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Ledger => LEDGER,
            Vendor::Trezor => TREZOR,
            Vendor::KeepKey => KEEPKEY,
        }
    }

    pub fn supports_btc(&self) -> bool {
        self.families.contains(CoinFamilies::BTC)
    }

    pub fn supports_eth(&self) -> bool {
        self.families.contains(CoinFamilies::ETH)
    }

    pub fn supports_debug_link(&self) -> bool {
        self.families.contains(CoinFamilies::DEBUG_LINK)
    }

    /// 设备是否列出该币种 (任意币族)
    fn lists(&self, info: &CoinInfo) -> bool {
        self.coins.contains(&info.name)
    }

    /// 任意币族的已列出币种, 用于 xpub 导出和兑换对
    pub fn supports_any_coin(&self, coin: &str) -> bool {
        catalog::coin(coin).map_or(false, |info| self.lists(info))
    }

    /// 该厂商列出的 BTC 系币种。未知, 未列出以及以太坊系均不支持
    pub fn supports_coin(&self, coin: &str) -> bool {
        match catalog::coin(coin) {
            Ok(info) => info.family == CoinFamily::Bitcoin && self.lists(info),
            Err(_) => false,
        }
    }

    /// 币种须通过 [`supports_coin`](Self::supports_coin), 且目录中列出该脚本类型
    pub fn supports_script_type(&self, coin: &str, script_type: InputScriptType) -> bool {
        let Ok(info) = catalog::coin(coin) else {
            return false;
        };
        if info.family != CoinFamily::Bitcoin
            || !self.lists(info)
            || !self.script_types.contains(&script_type)
        {
            return false;
        }
        match script_type {
            // 多签与外部输入不是账户模板
            SpendMultisig | External => true,
            _ => info.supports_script_type(script_type),
        }
    }

    /// 内部转账无需在屏幕上确认目标地址
    pub fn supports_secure_transfer(&self) -> bool {
        self.secure_transfer
    }

    /// 输出中可嵌入签名的兑换载荷
    pub fn supports_native_exchange(&self) -> bool {
        self.native_exchange
    }

    /// 两个指定币种之间的原生兑换
    pub fn has_native_exchange(&self, src_coin: &str, dst_coin: &str) -> bool {
        self.native_exchange && self.supports_any_coin(src_coin) && self.supports_any_coin(dst_coin)
    }

    pub fn has_on_device_pin_entry(&self) -> bool {
        self.on_device_pin_entry
    }

    pub fn has_on_device_passphrase(&self) -> bool {
        self.on_device_passphrase
    }

    pub fn has_on_device_display(&self) -> bool {
        self.on_device_display
    }

    pub fn has_on_device_recovery(&self) -> bool {
        self.on_device_recovery
    }
}
