//! 扩展公钥重建
//!
//! 设备只按路径返回原始公钥; 这里从父公钥、子公钥和 chain code 重建
//! 标准 BIP32 序列化 (78 字节 payload + base58check)。结果必须逐位一致。

use crate::core::errors::WalletError;
use ripemd::Ripemd160;
use secp256k1::PublicKey;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::path::HARDENED;

/// 序列化 payload 长度 (不含校验和)
pub const XPUB_PAYLOAD_LEN: usize = 78;

/// 解码后的 BIP32 扩展公钥
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    pub version: u32,
    pub depth: u8,
    pub parent_fingerprint: u32,
    /// High bit set iff hardened
    pub child_number: u32,
    pub chain_code: [u8; 32],
    pub public_key: [u8; 33],
}

impl ExtendedPublicKey {
    /// 子索引是否 hardened
    pub fn is_hardened(&self) -> bool {
        self.child_number & HARDENED != 0
    }

    /// version ‖ depth ‖ parent fingerprint ‖ child number ‖ chain code ‖ key
    pub fn to_bytes(&self) -> [u8; XPUB_PAYLOAD_LEN] {
        let mut out = [0u8; XPUB_PAYLOAD_LEN];
        out[0..4].copy_from_slice(&self.version.to_be_bytes());
        out[4] = self.depth;
        out[5..9].copy_from_slice(&self.parent_fingerprint.to_be_bytes());
        out[9..13].copy_from_slice(&self.child_number.to_be_bytes());
        out[13..45].copy_from_slice(&self.chain_code);
        out[45..78].copy_from_slice(&self.public_key);
        out
    }

    /// payload 的 base58check 编码
    pub fn encode(&self) -> String {
        encode_base58_check(&self.to_bytes())
    }

    /// 解码并校验 xpub 字符串
    ///
    /// 校验和、长度与公钥点任一无效都返回 `DeviceResponseInvalid`。
    pub fn decode(encoded: &str) -> Result<Self, WalletError> {
        let raw = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| WalletError::DeviceResponseInvalid(format!("xpub is not base58: {}", e)))?;

        if raw.len() != XPUB_PAYLOAD_LEN + 4 {
            return Err(WalletError::DeviceResponseInvalid(format!(
                "xpub has {} bytes, expected {}",
                raw.len(),
                XPUB_PAYLOAD_LEN + 4
            )));
        }

        let (payload, checksum) = raw.split_at(XPUB_PAYLOAD_LEN);
        if checksum != &double_sha256(payload)[..4] {
            return Err(WalletError::DeviceResponseInvalid(
                "xpub checksum mismatch".to_string(),
            ));
        }

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&payload[13..45]);

        Ok(Self {
            version: be_u32(&payload[0..4]),
            depth: payload[4],
            parent_fingerprint: be_u32(&payload[5..9]),
            child_number: be_u32(&payload[9..13]),
            chain_code,
            public_key: compress_public_key(&payload[45..78])?,
        })
    }
}

/// 大端 u32
fn be_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// payload ‖ SHA256d 前 4 字节, 再 base58 编码
pub fn encode_base58_check(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

/// 把 33 或 65 字节的 SEC1 公钥规整为压缩格式
///
/// 其他长度及不在 secp256k1 上的点都会被拒绝。
pub fn compress_public_key(raw: &[u8]) -> Result<[u8; 33], WalletError> {
    if raw.len() != 33 && raw.len() != 65 {
        return Err(WalletError::DeviceResponseInvalid(format!(
            "public key has {} bytes, expected 33 or 65",
            raw.len()
        )));
    }
    let key = PublicKey::from_slice(raw)
        .map_err(|e| WalletError::DeviceResponseInvalid(format!("invalid public key: {}", e)))?;
    Ok(key.serialize())
}

/// 父公钥指纹: 压缩父公钥 HASH160 的前 4 字节 (大端)
pub fn fingerprint(parent_compressed: &[u8; 33]) -> u32 {
    be_u32(&hash160(parent_compressed)[..4])
}

/// 单个扩展公钥所需的设备原始数据
#[derive(Debug, Clone, Copy)]
pub struct XpubParts<'a> {
    /// Parent public key, compressed or uncompressed
    pub parent_public_key: &'a [u8],
    /// Child public key, compressed or uncompressed
    pub child_public_key: &'a [u8],
    pub chain_code: &'a [u8],
    /// Network BIP32 public version bytes
    pub version: u32,
    /// Number of path segments applied
    pub depth: u8,
    /// Child index without the hardened bit
    pub index: u32,
    pub hardened: bool,
}

/// 从设备响应组装扩展公钥
pub fn build(parts: XpubParts<'_>) -> Result<ExtendedPublicKey, WalletError> {
    if parts.index >= HARDENED {
        return Err(WalletError::InvalidRequest(format!(
            "child index out of range: {:#x}",
            parts.index
        )));
    }
    if parts.chain_code.len() != 32 {
        return Err(WalletError::DeviceResponseInvalid(format!(
            "chain code has {} bytes, expected 32",
            parts.chain_code.len()
        )));
    }

    let parent = compress_public_key(parts.parent_public_key)?;
    let public_key = compress_public_key(parts.child_public_key)?;

    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(parts.chain_code);

    let child_number = if parts.hardened {
        parts.index | HARDENED
    } else {
        parts.index
    };

    let xpub = ExtendedPublicKey {
        version: parts.version,
        depth: parts.depth,
        parent_fingerprint: fingerprint(&parent),
        child_number,
        chain_code,
        public_key,
    };
    debug!(
        depth = xpub.depth,
        fingerprint = format_args!("{:08x}", xpub.parent_fingerprint),
        child = format_args!("{:#x}", xpub.child_number),
        "assembled extended public key"
    );
    Ok(xpub)
}

/// [`build`] 之后再做 base58check 编码
pub fn build_encoded(parts: XpubParts<'_>) -> Result<String, WalletError> {
    Ok(build(parts)?.encode())
}
