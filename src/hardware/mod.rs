//! 硬件钱包抽象层
//!
//! 以厂商无关的方式访问 Ledger / Trezor / KeepKey 设备, 底层通过抽象的
//! [`Transport`] 通信。账户路径, 能力协商, xpub 重建, 交易校验与错误翻译都在这里。

pub mod accounts;
pub mod capabilities;
pub mod catalog;
pub mod message;
pub mod mock;
pub mod path;
pub mod status;
pub mod transaction;
pub mod transport;
pub mod wallet;
pub mod xpub;

pub use accounts::AccountPath;
pub use capabilities::{Capabilities, CoinFamilies, Vendor};
pub use catalog::{InputScriptType, OutputScriptType};
pub use path::Bip32Path;
pub use transport::{DeviceEvent, Transport, TransportResponse};
pub use wallet::{BtcWallet, DeviceWallet, EthWallet, HdWallet};
pub use xpub::ExtendedPublicKey;
