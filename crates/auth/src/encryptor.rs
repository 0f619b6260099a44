//! Outer token: JWE compact serialization, `dir` + `A128CBC-HS256`.
//!
//! Layout (RFC 7516 §7.1): `header..iv.ciphertext.tag`; the encrypted-key
//! segment is empty under direct key agreement. The 32-byte key splits into a
//! 16-byte MAC key followed by a 16-byte AES key (RFC 7518 §5.2.2.1).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

pub const ALG_DIRECT: &str = "dir";
pub const ENC_A128CBC_HS256: &str = "A128CBC-HS256";

/// Key length required by `A128CBC-HS256`.
pub const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("malformed compact serialization: {0}")]
    Malformed(&'static str),

    #[error("unsupported protected header (alg={alg}, enc={enc})")]
    UnsupportedHeader { alg: String, enc: String },

    #[error("authentication tag mismatch")]
    TagMismatch,

    #[error("invalid padding")]
    Padding,

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Encrypt/decrypt strategy for the outer token.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, EncryptionError>;
    fn decrypt(&self, compact: &str) -> Result<Vec<u8>, EncryptionError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ProtectedHeader {
    alg: String,
    enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cty: Option<String>,
}

/// Direct-key `A128CBC-HS256` encryptor.
///
/// The key length is checked on every call, never at construction, and a key
/// of the wrong size is rejected rather than truncated or padded.
#[derive(Clone)]
pub struct DirectEncryptor {
    key: Vec<u8>,
}

impl DirectEncryptor {
    pub fn new(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    fn split_key(&self) -> Result<(&[u8], &[u8]), EncryptionError> {
        if self.key.len() != KEY_LEN {
            return Err(EncryptionError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: self.key.len(),
            });
        }
        Ok(self.key.split_at(KEY_LEN / 2))
    }
}

impl core::fmt::Debug for DirectEncryptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DirectEncryptor([REDACTED; {} bytes])", self.key.len())
    }
}

impl Encryptor for DirectEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, EncryptionError> {
        let (mac_key, enc_key) = self.split_key()?;

        let header = ProtectedHeader {
            alg: ALG_DIRECT.to_string(),
            enc: ENC_A128CBC_HS256.to_string(),
            cty: Some("JWT".to_string()),
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);

        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes128CbcEnc::new_from_slices(enc_key, &iv)
            .map_err(|_| EncryptionError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: self.key.len(),
            })?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mac = authenticator(mac_key, header_b64.as_bytes(), &iv, &ciphertext)?;
        let full_tag = mac.finalize().into_bytes();

        Ok(format!(
            "{}..{}.{}.{}",
            header_b64,
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(&ciphertext),
            URL_SAFE_NO_PAD.encode(&full_tag[..TAG_LEN]),
        ))
    }

    fn decrypt(&self, compact: &str) -> Result<Vec<u8>, EncryptionError> {
        let (mac_key, enc_key) = self.split_key()?;

        let segments: Vec<&str> = compact.trim().split('.').collect();
        let &[header_b64, encrypted_key, iv_b64, ciphertext_b64, tag_b64] = segments.as_slice()
        else {
            return Err(EncryptionError::Malformed("expected five segments"));
        };

        if !encrypted_key.is_empty() {
            return Err(EncryptionError::Malformed(
                "direct encryption carries no encrypted key",
            ));
        }

        let header: ProtectedHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64)?)?;
        if header.alg != ALG_DIRECT || header.enc != ENC_A128CBC_HS256 {
            return Err(EncryptionError::UnsupportedHeader {
                alg: header.alg,
                enc: header.enc,
            });
        }

        let iv = URL_SAFE_NO_PAD.decode(iv_b64)?;
        if iv.len() != IV_LEN {
            return Err(EncryptionError::Malformed("initialization vector must be 16 bytes"));
        }
        let tag = URL_SAFE_NO_PAD.decode(tag_b64)?;
        if tag.len() != TAG_LEN {
            return Err(EncryptionError::Malformed("authentication tag must be 16 bytes"));
        }
        let ciphertext = URL_SAFE_NO_PAD.decode(ciphertext_b64)?;

        authenticator(mac_key, header_b64.as_bytes(), &iv, &ciphertext)?
            .verify_truncated_left(&tag)
            .map_err(|_| EncryptionError::TagMismatch)?;

        Aes128CbcDec::new_from_slices(enc_key, &iv)
            .map_err(|_| EncryptionError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: self.key.len(),
            })?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| EncryptionError::Padding)
    }
}

/// HMAC over `AAD || IV || ciphertext || AL`, where AL is the AAD bit length
/// as a big-endian u64.
fn authenticator(
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<HmacSha256, EncryptionError> {
    let mut mac = HmacSha256::new_from_slice(mac_key).map_err(|_| {
        EncryptionError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: mac_key.len() * 2,
        }
    })?;
    let aad_bits = (aad.len() as u64) * 8;
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&aad_bits.to_be_bytes());
    Ok(mac)
}
