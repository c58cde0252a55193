//! Legacy OpenSSL encrypted-PEM support.
//!
//! Encrypted private keys carry two headers:
//!
//! ```text
//! Proc-Type: 4,ENCRYPTED
//! DEK-Info: AES-256-CBC,8A4F1C...
//! ```
//!
//! The cipher key is derived with OpenSSL's `EVP_BytesToKey` (MD5, one round,
//! salt = first 8 bytes of the IV) and the payload is CBC with PKCS#7 padding.

use crate::error::{PkiError, Result};
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};

/// Value of the `Proc-Type` header on an encrypted block.
pub const PROC_TYPE_ENCRYPTED: &str = "4,ENCRYPTED";

/// CBC initialisation vector length for AES.
pub const IV_LEN: usize = 16;

/// Length of the `EVP_BytesToKey` salt taken from the IV.
const SALT_LEN: usize = 8;

const BLOCK_LEN: usize = 16;

/// Ciphers accepted in a `DEK-Info` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemCipher {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl PemCipher {
    pub fn name(&self) -> &'static str {
        match self {
            PemCipher::Aes128Cbc => "AES-128-CBC",
            PemCipher::Aes192Cbc => "AES-192-CBC",
            PemCipher::Aes256Cbc => "AES-256-CBC",
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            PemCipher::Aes128Cbc => 16,
            PemCipher::Aes192Cbc => 24,
            PemCipher::Aes256Cbc => 32,
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim() {
            "AES-128-CBC" => Ok(PemCipher::Aes128Cbc),
            "AES-192-CBC" => Ok(PemCipher::Aes192Cbc),
            "AES-256-CBC" => Ok(PemCipher::Aes256Cbc),
            other => Err(PkiError::UnsupportedCipher(other.to_string())),
        }
    }
}

/// A parsed `DEK-Info` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DekInfo {
    pub cipher: PemCipher,
    pub iv: Vec<u8>,
}

impl DekInfo {
    /// Parse `"<CIPHER>,<HEX IV>"`.
    ///
    /// # Example
    ///
    /// ```
    /// use kmspki::crypto::pem_encryption::{DekInfo, PemCipher};
    ///
    /// let info = DekInfo::parse("AES-128-CBC,000102030405060708090A0B0C0D0E0F").unwrap();
    /// assert_eq!(info.cipher, PemCipher::Aes128Cbc);
    /// assert_eq!(info.iv.len(), 16);
    /// ```
    pub fn parse(value: &str) -> Result<Self> {
        let (name, iv_hex) = value
            .split_once(',')
            .ok_or_else(|| PkiError::DecodeError(format!("Malformed DEK-Info header: {}", value)))?;
        let cipher = PemCipher::from_name(name)?;
        let iv = hex::decode(iv_hex.trim())
            .map_err(|e| PkiError::DecodeError(format!("Invalid DEK-Info IV: {}", e)))?;
        if iv.len() != IV_LEN {
            return Err(PkiError::DecodeError(format!(
                "DEK-Info IV must be {} bytes, got {}",
                IV_LEN,
                iv.len()
            )));
        }
        Ok(Self { cipher, iv })
    }

    /// Header value in the form OpenSSL writes it (upper-case hex IV).
    pub fn to_header_value(&self) -> String {
        format!("{},{}", self.cipher.name(), hex::encode_upper(&self.iv))
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration.
pub fn derive_key(passphrase: &[u8], salt: &[u8], key_len: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(key_len + 16);
    let mut previous: Vec<u8> = Vec::new();

    while key.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        key.extend_from_slice(&previous);
    }

    key.truncate(key_len);
    key
}

/// Decrypt an encrypted PEM payload.
///
/// A padding failure almost always means the passphrase is wrong and is
/// reported as [`PkiError::InvalidPasswordError`].
pub fn decrypt(dek: &DekInfo, passphrase: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if dek.iv.len() != IV_LEN {
        return Err(PkiError::DecodeError(format!(
            "IV must be {} bytes, got {}",
            IV_LEN,
            dek.iv.len()
        )));
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(PkiError::DecodeError(format!(
            "Encrypted payload length {} is not a multiple of the block size",
            ciphertext.len()
        )));
    }

    let key = derive_key(passphrase, &dek.iv[..SALT_LEN], dek.cipher.key_len());
    let plaintext = match dek.cipher {
        PemCipher::Aes128Cbc => cbc::Decryptor::<Aes128>::new_from_slices(&key, &dek.iv)
            .map_err(|e| PkiError::CryptoError(format!("Invalid key or IV length: {}", e)))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        PemCipher::Aes192Cbc => cbc::Decryptor::<Aes192>::new_from_slices(&key, &dek.iv)
            .map_err(|e| PkiError::CryptoError(format!("Invalid key or IV length: {}", e)))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        PemCipher::Aes256Cbc => cbc::Decryptor::<Aes256>::new_from_slices(&key, &dek.iv)
            .map_err(|e| PkiError::CryptoError(format!("Invalid key or IV length: {}", e)))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
    };

    plaintext.map_err(|_| PkiError::InvalidPasswordError)
}

/// Encrypt a PEM payload under `dek`.
pub fn encrypt(dek: &DekInfo, passphrase: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if dek.iv.len() != IV_LEN {
        return Err(PkiError::CryptoError(format!(
            "IV must be {} bytes, got {}",
            IV_LEN,
            dek.iv.len()
        )));
    }

    let key = derive_key(passphrase, &dek.iv[..SALT_LEN], dek.cipher.key_len());
    let ciphertext = match dek.cipher {
        PemCipher::Aes128Cbc => cbc::Encryptor::<Aes128>::new_from_slices(&key, &dek.iv)
            .map_err(|e| PkiError::CryptoError(format!("Invalid key or IV length: {}", e)))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        PemCipher::Aes192Cbc => cbc::Encryptor::<Aes192>::new_from_slices(&key, &dek.iv)
            .map_err(|e| PkiError::CryptoError(format!("Invalid key or IV length: {}", e)))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        PemCipher::Aes256Cbc => cbc::Encryptor::<Aes256>::new_from_slices(&key, &dek.iv)
            .map_err(|e| PkiError::CryptoError(format!("Invalid key or IV length: {}", e)))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
    };

    Ok(ciphertext)
}
