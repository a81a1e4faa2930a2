//! BIP32 路径
//!
//! 派生索引的有序序列, hardened 段带最高位 (0x8000_0000)。
//! Parses `m/...` strings and renders both the absolute and the Ledger-relative form.

use crate::core::errors::WalletError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hardened 标志位
pub const HARDENED: u32 = 0x8000_0000;

/// 加上 hardened 标志
pub const fn hardened(index: u32) -> u32 {
    index | HARDENED
}

/// 是否为 hardened 索引
pub fn is_hardened(index: u32) -> bool {
    index & HARDENED != 0
}

/// BIP32 路径
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bip32Path {
    pub path: Vec<u32>,
}

impl Bip32Path {
    /// 创建新的 BIP32 路径
    pub fn new(path: Vec<u32>) -> Self {
        Self { path }
    }

    /// 路径段数 (即派生深度)
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// 空路径对应 `m`
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// 前 `n` 段; 路径更短时返回整条路径
    pub fn prefix(&self, n: usize) -> Self {
        Self::new(self.path[..n.min(self.path.len())].to_vec())
    }

    /// 去掉最后一段; 根路径保持不变
    pub fn parent(&self) -> Self {
        self.prefix(self.path.len().saturating_sub(1))
    }

    /// 最后一段索引
    pub fn last(&self) -> Option<u32> {
        self.path.last().copied()
    }

    /// 所有 hardened 段都在非 hardened 段之前
    pub fn is_standard(&self) -> bool {
        let first_soft = self
            .path
            .iter()
            .position(|&i| !is_hardened(i))
            .unwrap_or(self.path.len());
        self.path[first_soft..].iter().all(|&i| !is_hardened(i))
    }

    /// 不带 `m/` 前缀的路径字符串 (Ledger BTC app 的格式)
    pub fn to_relative_string(&self) -> String {
        self.path
            .iter()
            .map(|&i| {
                if is_hardened(i) {
                    format!("{}'", i & !HARDENED)
                } else {
                    i.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// 序列化为字节: length(1) ‖ index(4, BE)…
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.path.len() * 4);
        bytes.push(self.path.len() as u8);

        for index in &self.path {
            bytes.extend_from_slice(&index.to_be_bytes());
        }

        bytes
    }
}

impl From<Vec<u32>> for Bip32Path {
    fn from(path: Vec<u32>) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for Bip32Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "m");
        }
        write!(f, "m/{}", self.to_relative_string())
    }
}

impl FromStr for Bip32Path {
    type Err = WalletError;

    /// 解析 `m/44'/0'/0'/0/0`; `'` 与 `h` 都表示 hardened
    fn from_str(path_str: &str) -> Result<Self, Self::Err> {
        if path_str == "m" {
            return Ok(Self::default());
        }
        let rest = path_str.strip_prefix("m/").ok_or_else(|| {
            WalletError::InvalidRequest(format!("path must start with m/: {}", path_str))
        })?;

        if rest.is_empty() {
            return Err(WalletError::InvalidRequest(format!(
                "path has no segments: {}",
                path_str
            )));
        }

        let mut path = Vec::new();
        for part in rest.split('/') {
            let (num_str, hardened_seg) = match part
                .strip_suffix('\'')
                .or_else(|| part.strip_suffix('h'))
            {
                Some(stripped) => (stripped, true),
                None => (part, false),
            };

            let num: u32 = num_str.parse().map_err(|_| {
                WalletError::InvalidRequest(format!("invalid path segment {:?} in {}", part, path_str))
            })?;
            if num >= HARDENED {
                return Err(WalletError::InvalidRequest(format!(
                    "path segment out of range: {}",
                    part
                )));
            }

            path.push(if hardened_seg { hardened(num) } else { num });
        }

        Ok(Self { path })
    }
}
