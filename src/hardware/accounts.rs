//! 账户路径解析
//!
//! 按账户序号实例化目录模板, 并判断一组账户路径能否作为同一账户花费。

use super::catalog::{self, CoinFamily, InputScriptType};
use super::path::{hardened, is_hardened, Bip32Path, HARDENED};
use crate::core::errors::WalletError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 账户的一种派生方式
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPath {
    pub script_type: InputScriptType,
    pub address_n_list: Bip32Path,
}

/// 币种的候选账户路径, 优先级从高到低
///
/// 传入 `script_type` 时只返回匹配项, 顺序不变。以太坊走
/// `eth_get_account_paths`。
pub fn get_account_paths(
    coin: &str,
    account: u32,
    script_type: Option<InputScriptType>,
) -> Result<Vec<AccountPath>, WalletError> {
    let info = catalog::coin(coin)?;
    if info.family != CoinFamily::Bitcoin {
        return Err(WalletError::UnsupportedOperation(format!(
            "{} accounts are resolved with eth_get_account_paths",
            info.name
        )));
    }
    if account >= HARDENED {
        return Err(WalletError::InvalidRequest(format!(
            "account index out of range: {}",
            account
        )));
    }

    let paths: Vec<AccountPath> = info
        .preferences
        .iter()
        .filter(|p| script_type.map_or(true, |s| s == p.script_type))
        .map(|p| AccountPath {
            script_type: p.script_type,
            address_n_list: Bip32Path::new(vec![
                hardened(p.purpose),
                hardened(p.coin_type),
                hardened(account),
            ]),
        })
        .collect();

    debug!(coin = info.name, account, count = paths.len(), "resolved account paths");
    Ok(paths)
}

/// 以太坊账户路径 `m/44'/60'/a'/0/0`
pub fn eth_get_account_paths(account: u32) -> Result<Vec<Bip32Path>, WalletError> {
    if account >= HARDENED {
        return Err(WalletError::InvalidRequest(format!(
            "account index out of range: {}",
            account
        )));
    }
    let eth = catalog::coin("Ethereum")?;
    Ok(vec![Bip32Path::new(vec![
        hardened(44),
        hardened(eth.slip44),
        hardened(account),
        0,
        0,
    ])])
}

/// 账户层级分量 (purpose, coin type, account), 去掉硬化位
fn split_account(path: &Bip32Path) -> Option<(u32, u32, u32)> {
    match path.path.as_slice() {
        [p, c, a] if is_hardened(*p) && is_hardened(*c) && is_hardened(*a) => {
            Some((p & !HARDENED, c & !HARDENED, a & !HARDENED))
        }
        _ => None,
    }
}

/// 是否同一币种的同一账户
///
/// 空集和单元素集直接成立。否则全部路径必须是账户层级, 账户序号一致,
/// 且所有 (脚本类型, purpose, coin type) 都属于同一币种的目录偏好。
pub fn is_same_account(paths: &[AccountPath]) -> bool {
    if paths.len() <= 1 {
        return true;
    }

    let mut parts = Vec::with_capacity(paths.len());
    for ap in paths {
        match split_account(&ap.address_n_list) {
            Some(split) => parts.push((ap.script_type, split)),
            None => return false,
        }
    }

    let account = parts[0].1 .2;
    if parts.iter().any(|(_, (_, _, a))| *a != account) {
        return false;
    }

    catalog::coins()
        .iter()
        .filter(|c| c.family == CoinFamily::Bitcoin)
        .any(|c| {
            parts.iter().all(|(script_type, (purpose, coin_type, _))| {
                c.preferences.iter().any(|p| {
                    p.script_type == *script_type
                        && p.purpose == *purpose
                        && p.coin_type == *coin_type
                })
            })
        })
}
