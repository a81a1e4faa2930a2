//! 本地消息签名验证
//!
//! 签名在设备上完成; 验证只需要公开数据, 因此 Bitcoin signed-message
//! 与 EIP-191 personal message 都在本地校验, 不经过传输层。

use super::catalog::{self, CoinFamily, CoinInfo};
use super::xpub::{encode_base58_check, hash160};
use crate::core::errors::WalletError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bech32::{segwit, Hrp};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use tracing::debug;

const ETH_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// 签名消息前缀 (按币种)
fn message_magic(coin: &str) -> &'static str {
    match coin {
        "Litecoin" => "Litecoin Signed Message:\n",
        "Dogecoin" => "Dogecoin Signed Message:\n",
        "Dash" => "DarkCoin Signed Message:\n",
        "BitcoinGold" => "Bitcoin Gold Signed Message:\n",
        _ => "Bitcoin Signed Message:\n",
    }
}

fn write_varint(out: &mut Vec<u8>, n: usize) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&(n as u64).to_le_bytes());
        }
    }
}

/// SHA256d(`varint(magic) ‖ magic ‖ varint(msg) ‖ msg`)
pub fn bitcoin_message_hash(coin: &str, message: &[u8]) -> Result<[u8; 32], WalletError> {
    let info = catalog::coin(coin)?;
    let magic = message_magic(info.name);

    let mut data = Vec::with_capacity(magic.len() + message.len() + 10);
    write_varint(&mut data, magic.len());
    data.extend_from_slice(magic.as_bytes());
    write_varint(&mut data, message.len());
    data.extend_from_slice(message);

    let first = Sha256::digest(&data);
    Ok(Sha256::digest(first).into())
}

/// EIP-191 personal message 的 keccak256
pub fn eth_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(ETH_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// 签名可以是 base64 (Bitcoin Core) 或 hex (设备输出)
fn decode_signature(signature: &str) -> Result<[u8; 65], WalletError> {
    let trimmed = signature.trim().trim_start_matches("0x");
    let raw = hex::decode(trimmed)
        .ok()
        .filter(|b| b.len() == 65)
        .or_else(|| STANDARD.decode(signature.trim()).ok())
        .ok_or_else(|| WalletError::InvalidRequest("signature is neither hex nor base64".into()))?;

    <[u8; 65]>::try_from(raw.as_slice()).map_err(|_| {
        WalletError::InvalidRequest(format!("signature has {} bytes, expected 65", raw.len()))
    })
}

fn recover(digest: &[u8; 32], compact: &[u8], recid: u8) -> Option<PublicKey> {
    let secp = Secp256k1::verification_only();
    let msg = Message::from_slice(digest).ok()?;
    let id = RecoveryId::from_i32(recid as i32).ok()?;
    let sig = RecoverableSignature::from_compact(compact, id).ok()?;
    secp.recover_ecdsa(&msg, &sig).ok()
}

fn p2pkh_address(version: u8, key_bytes: &[u8]) -> String {
    let mut payload = vec![version];
    payload.extend_from_slice(&hash160(key_bytes));
    encode_base58_check(&payload)
}

fn p2sh_p2wpkh_address(version: u8, compressed: &[u8; 33]) -> String {
    let mut redeem = vec![0x00, 0x14];
    redeem.extend_from_slice(&hash160(compressed));
    let mut payload = vec![version];
    payload.extend_from_slice(&hash160(&redeem));
    encode_base58_check(&payload)
}

/// 原生隔离见证 v0 P2WPKH 地址 (小写)
fn p2wpkh_address(hrp: &str, compressed: &[u8; 33]) -> Result<String, WalletError> {
    let hrp = Hrp::parse(hrp)
        .map_err(|e| WalletError::UnsupportedOperation(format!("bad bech32 prefix {}: {}", hrp, e)))?;
    segwit::encode_v0(hrp, &hash160(compressed))
        .map_err(|e| WalletError::UnsupportedOperation(format!("bech32 encoding failed: {}", e)))
}

/// 本地可重建的地址编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressKind {
    Base58,
    Bech32,
}

fn address_kind(info: &CoinInfo, address: &str) -> Option<AddressKind> {
    if let Some(hrp) = info.bech32_hrp {
        let lower = address.to_ascii_lowercase();
        if lower.len() > hrp.len() && lower.starts_with(hrp) && lower[hrp.len()..].starts_with('1') {
            return Some(AddressKind::Bech32);
        }
    }
    // version byte + hash160 + checksum
    bs58::decode(address)
        .into_vec()
        .ok()
        .filter(|raw| raw.len() == 25)
        .map(|_| AddressKind::Base58)
}

/// 验证 BTC 系签名消息
///
/// 接受 header 27-30 (非压缩 P2PKH), 31-34 (压缩 P2PKH), 35-38 (P2SH-P2WPKH),
/// 39-42 (P2WPKH)。压缩公钥与该币种所有压缩公钥地址比对。本地无法重建的地址编码
/// (CashAddr, 其他网络的 bech32) 返回 `UnsupportedOperation`; 其他密钥的合法签名
/// 返回 `Ok(false)`。
pub fn verify_bitcoin_message(
    coin: &str,
    address: &str,
    message: &[u8],
    signature: &str,
) -> Result<bool, WalletError> {
    let info = catalog::coin(coin)?;
    if info.family != CoinFamily::Bitcoin {
        return Err(WalletError::UnsupportedOperation(format!(
            "{} is not a Bitcoin-family coin",
            info.name
        )));
    }
    let (Some(p2pkh), Some(p2sh)) = (info.p2pkh_version, info.p2sh_version) else {
        return Err(WalletError::UnsupportedOperation(format!(
            "{} has no base58 address versions",
            info.name
        )));
    };
    let address = address.trim();
    let Some(kind) = address_kind(info, address) else {
        return Err(WalletError::UnsupportedOperation(format!(
            "cannot verify {} messages for address {}",
            info.name, address
        )));
    };

    let sig = decode_signature(signature)?;
    let header = sig[0];
    if !(27..=42).contains(&header) {
        return Err(WalletError::InvalidRequest(format!(
            "unsupported signature header {}",
            header
        )));
    }
    let recid = (header - 27) & 3;
    let compressed = header >= 31;

    let digest = bitcoin_message_hash(info.name, message)?;
    let Some(key) = recover(&digest, &sig[1..], recid) else {
        return Ok(false);
    };
    debug!(coin = info.name, header, ?kind, "verifying signed message");

    // 未压缩公钥只对应 P2PKH
    if !compressed {
        return Ok(kind == AddressKind::Base58
            && p2pkh_address(p2pkh, &key.serialize_uncompressed()) == address);
    }
    let ser = key.serialize();
    match (kind, info.bech32_hrp) {
        (AddressKind::Bech32, Some(hrp)) => {
            Ok(p2wpkh_address(hrp, &ser)? == address.to_ascii_lowercase())
        }
        _ => Ok(p2pkh_address(p2pkh, &ser) == address || p2sh_p2wpkh_address(p2sh, &ser) == address),
    }
}

/// 非压缩 secp256k1 公钥对应的地址, 小写 hex
pub fn eth_address(key: &PublicKey) -> String {
    let uncompressed = key.serialize_uncompressed();
    let hash = Keccak256::digest(&uncompressed[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// 验证 EIP-191 personal message 签名 (`r ‖ s ‖ v`)
pub fn verify_eth_message(address: &str, message: &[u8], signature: &str) -> Result<bool, WalletError> {
    let sig = decode_signature(signature)?;
    let v = sig[64];
    let recid = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => {
            return Err(WalletError::InvalidRequest(format!(
                "invalid recovery byte {}",
                other
            )))
        }
    };

    let digest = eth_message_hash(message);
    Ok(recover(&digest, &sig[..64], recid)
        .map(|key| eth_address(&key).eq_ignore_ascii_case(address))
        .unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    fn secret() -> SecretKey {
        SecretKey::from_slice(&[0x11; 32]).unwrap()
    }

    fn sign(digest: [u8; 32]) -> (u8, [u8; 64]) {
        let secp = Secp256k1::new();
        let msg = Message::from_slice(&digest).unwrap();
        let (id, compact) = secp.sign_ecdsa_recoverable(&msg, &secret()).serialize_compact();
        (id.to_i32() as u8, compact)
    }

    fn btc_sig(coin: &str, header_base: u8, message: &[u8]) -> String {
        let (recid, compact) = sign(bitcoin_message_hash(coin, message).unwrap());
        let mut raw = vec![header_base + recid];
        raw.extend_from_slice(&compact);
        STANDARD.encode(raw)
    }

    fn public() -> PublicKey {
        PublicKey::from_secret_key(&Secp256k1::new(), &secret())
    }

    #[test]
    fn test_varint_boundaries() {
        let mut out = Vec::new();
        write_varint(&mut out, 0xfc);
        write_varint(&mut out, 0xfd);
        assert_eq!(out, vec![0xfc, 0xfd, 0xfd, 0x00]);
    }

    #[test]
    fn test_p2pkh_compressed_round_trip() {
        let address = p2pkh_address(0x00, &public().serialize());
        let sig = btc_sig("Bitcoin", 31, b"hello world");
        assert!(verify_bitcoin_message("Bitcoin", &address, b"hello world", &sig).unwrap());
        assert!(!verify_bitcoin_message("Bitcoin", &address, b"hello w0rld", &sig).unwrap());
    }

    #[test]
    fn test_p2sh_segwit_address() {
        let address = p2sh_p2wpkh_address(0x05, &public().serialize());
        assert!(address.starts_with('3'));
        let sig = btc_sig("Bitcoin", 35, b"segwit");
        assert!(verify_bitcoin_message("Bitcoin", &address, b"segwit", &sig).unwrap());
    }

    #[test]
    fn test_uncompressed_header() {
        let address = p2pkh_address(0x00, &public().serialize_uncompressed());
        let sig = btc_sig("Bitcoin", 27, b"legacy");
        assert!(verify_bitcoin_message("Bitcoin", &address, b"legacy", &sig).unwrap());

        let compressed_addr = p2pkh_address(0x00, &public().serialize());
        assert!(!verify_bitcoin_message("Bitcoin", &compressed_addr, b"legacy", &sig).unwrap());
    }

    #[test]
    fn test_litecoin_magic_differs() {
        let address = p2pkh_address(0x30, &public().serialize());
        assert!(address.starts_with('L'));
        let btc_signed = btc_sig("Bitcoin", 31, b"ltc");
        assert!(!verify_bitcoin_message("Litecoin", &address, b"ltc", &btc_signed).unwrap());
        let ltc_signed = btc_sig("Litecoin", 31, b"ltc");
        assert!(verify_bitcoin_message("Litecoin", &address, b"ltc", &ltc_signed).unwrap());
    }

    #[test]
    fn test_native_segwit_header() {
        let address = p2wpkh_address("bc", &public().serialize()).unwrap();
        assert!(address.starts_with("bc1q"));
        let sig = btc_sig("Bitcoin", 39, b"native segwit");
        assert!(verify_bitcoin_message("Bitcoin", &address, b"native segwit", &sig).unwrap());
        assert!(verify_bitcoin_message("Bitcoin", &address.to_uppercase(), b"native segwit", &sig).unwrap());
        assert!(!verify_bitcoin_message("Bitcoin", &address, b"other", &sig).unwrap());
    }

    #[test]
    fn test_bech32_address_with_compressed_header() {
        let address = p2wpkh_address("ltc", &public().serialize()).unwrap();
        assert!(address.starts_with("ltc1q"));
        let sig = btc_sig("Litecoin", 31, b"ltc segwit");
        assert!(verify_bitcoin_message("Litecoin", &address, b"ltc segwit", &sig).unwrap());

        // 未压缩签名不可能对应隔离见证地址
        let uncompressed = btc_sig("Litecoin", 27, b"ltc segwit");
        assert!(!verify_bitcoin_message("Litecoin", &address, b"ltc segwit", &uncompressed).unwrap());
    }

    #[test]
    fn test_unverifiable_address_forms() {
        let sig = btc_sig("Bitcoin", 31, b"m");
        assert!(matches!(
            verify_bitcoin_message("BitcoinCash", "bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a", b"m", &sig),
            Err(WalletError::UnsupportedOperation(_))
        ));
        let bech = p2wpkh_address("bc", &public().serialize()).unwrap();
        assert!(matches!(
            verify_bitcoin_message("Dogecoin", &bech, b"m", &sig),
            Err(WalletError::UnsupportedOperation(_))
        ));

        let mut raw = STANDARD.decode(&sig).unwrap();
        raw[0] = 43;
        assert!(matches!(
            verify_bitcoin_message("Bitcoin", &bech, b"m", &STANDARD.encode(raw)),
            Err(WalletError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_malformed_signature() {
        let address = p2pkh_address(0x00, &public().serialize());
        let err = verify_bitcoin_message("Bitcoin", &address, b"m", "!!!").unwrap_err();
        assert!(matches!(err, WalletError::InvalidRequest(_)));
        assert!(matches!(
            verify_bitcoin_message("Ethereum", "1abc", b"m", "AA=="),
            Err(WalletError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            verify_bitcoin_message("Nope", "1abc", b"m", "AA=="),
            Err(WalletError::UnknownCoin(_))
        ));
    }

    #[test]
    fn test_eth_personal_message() {
        let (recid, compact) = sign(eth_message_hash(b"hello"));
        let mut raw = compact.to_vec();
        raw.push(27 + recid);
        let sig = format!("0x{}", hex::encode(&raw));
        let address = eth_address(&public());

        assert!(verify_eth_message(&address, b"hello", &sig).unwrap());
        assert!(verify_eth_message(&address.to_uppercase().replace("0X", "0x"), b"hello", &sig).unwrap());
        assert!(!verify_eth_message(&address, b"bye", &sig).unwrap());
    }

    #[test]
    fn test_eth_hash_known_value() {
        // keccak256("\x19Ethereum Signed Message:\n5hello")
        assert_eq!(
            hex::encode(eth_message_hash(b"hello")),
            "50b2c43fd39106bafbba0da34fc430e1f91e3c96ea2acee2bc34119f92b37750"
        );
    }
}
