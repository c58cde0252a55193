//! PEM encoding and decoding of certificates, requests and RSA keys.
//!
//! Output is byte-stable: encoding a decoded object reproduces the input,
//! with LF line endings and 64-column base64.

use crate::cert::certificate::IssuedCertificate;
use crate::cert::csr::CertificateRequest;
use crate::crypto::pem_encryption::{self, DekInfo, PemCipher, IV_LEN, PROC_TYPE_ENCRYPTED};
use crate::crypto::rsa::KeyPair;
use crate::entropy::EntropySource;
use crate::error::{PkiError, Result};
use ::pem::{EncodeConfig, LineEnding, Pem};
use tracing::debug;

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
pub const CERTIFICATE_REQUEST_LABEL: &str = "CERTIFICATE REQUEST";

const PROC_TYPE_HEADER: &str = "Proc-Type";
const DEK_INFO_HEADER: &str = "DEK-Info";

fn encode_block(block: &Pem) -> String {
    ::pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

/// Parse the first PEM block in `input` and check its label.
fn decode_block(input: &[u8], label: &str) -> Result<Pem> {
    let block = ::pem::parse(input)
        .map_err(|e| PkiError::DecodeError(format!("Failed to parse PEM: {}", e)))?;
    if block.tag() != label {
        return Err(PkiError::DecodeError(format!(
            "Expected {} PEM block, got {}",
            label,
            block.tag()
        )));
    }
    Ok(block)
}

/// Encode a certificate as a `CERTIFICATE` block.
pub fn encode_certificate(certificate: &IssuedCertificate) -> String {
    encode_block(&Pem::new(CERTIFICATE_LABEL, certificate.to_der()))
}

/// Encode a signing request as a `CERTIFICATE REQUEST` block.
pub fn encode_csr(csr: &CertificateRequest) -> String {
    encode_block(&Pem::new(CERTIFICATE_REQUEST_LABEL, csr.to_der()))
}

/// Encode a private key as an unencrypted PKCS#1 `RSA PRIVATE KEY` block.
pub fn encode_private_key(key: &KeyPair) -> Result<String> {
    Ok(encode_block(&Pem::new(RSA_PRIVATE_KEY_LABEL, key.to_pkcs1_der()?)))
}

/// Encode a private key as an OpenSSL-style encrypted PKCS#1 block.
///
/// The IV is drawn from `entropy`.
///
/// # Example
///
/// ```no_run
/// use kmspki::cert::codec::{decode_private_key, encode_private_key_encrypted};
/// use kmspki::crypto::pem_encryption::PemCipher;
/// use kmspki::crypto::rsa::KeyPair;
/// use kmspki::entropy::OsEntropy;
///
/// let key = KeyPair::generate(&OsEntropy).unwrap();
/// let pem = encode_private_key_encrypted(&key, "hunter2", PemCipher::Aes256Cbc, &OsEntropy).unwrap();
/// assert!(pem.contains("Proc-Type: 4,ENCRYPTED"));
/// assert_eq!(decode_private_key(pem.as_bytes(), Some("hunter2")).unwrap(), key);
/// ```
pub fn encode_private_key_encrypted<E: EntropySource + ?Sized>(
    key: &KeyPair,
    passphrase: &str,
    cipher: PemCipher,
    entropy: &E,
) -> Result<String> {
    let mut iv = vec![0u8; IV_LEN];
    entropy.fill(&mut iv)?;
    let dek = DekInfo { cipher, iv };

    let ciphertext = pem_encryption::encrypt(&dek, passphrase.as_bytes(), &key.to_pkcs1_der()?)?;

    let mut block = Pem::new(RSA_PRIVATE_KEY_LABEL, ciphertext);
    let headers = block.headers_mut();
    headers
        .add(PROC_TYPE_HEADER, PROC_TYPE_ENCRYPTED)
        .map_err(|e| PkiError::CryptoError(format!("Failed to add PEM header: {}", e)))?;
    headers
        .add(DEK_INFO_HEADER, &dek.to_header_value())
        .map_err(|e| PkiError::CryptoError(format!("Failed to add PEM header: {}", e)))?;

    debug!(cipher = cipher.name(), "encrypted private key");
    Ok(encode_block(&block))
}

/// Decode a `CERTIFICATE` block.
pub fn decode_certificate(input: &[u8]) -> Result<IssuedCertificate> {
    let block = decode_block(input, CERTIFICATE_LABEL)?;
    IssuedCertificate::from_der(block.contents())
}

/// Decode a `CERTIFICATE REQUEST` block and verify its signature.
pub fn decode_csr(input: &[u8]) -> Result<CertificateRequest> {
    let block = decode_block(input, CERTIFICATE_REQUEST_LABEL)?;
    CertificateRequest::from_der(block.contents())
}

/// Decode an `RSA PRIVATE KEY` block, decrypting it when it carries
/// `Proc-Type: 4,ENCRYPTED`.
///
/// An encrypted block without a passphrase is [`PkiError::PassphraseRequired`];
/// a wrong passphrase is [`PkiError::InvalidPasswordError`]. A passphrase given
/// for an unencrypted block is ignored.
pub fn decode_private_key(input: &[u8], passphrase: Option<&str>) -> Result<KeyPair> {
    let block = decode_block(input, RSA_PRIVATE_KEY_LABEL)?;

    let encrypted = match block.headers().get(PROC_TYPE_HEADER) {
        None => false,
        Some(value) if value.trim() == PROC_TYPE_ENCRYPTED => true,
        Some(value) => {
            return Err(PkiError::DecodeError(format!(
                "Unsupported Proc-Type: {}",
                value
            )))
        }
    };

    if !encrypted {
        return KeyPair::from_pkcs1_der(block.contents());
    }

    let passphrase = passphrase.ok_or(PkiError::PassphraseRequired)?;
    let dek = block
        .headers()
        .get(DEK_INFO_HEADER)
        .ok_or_else(|| PkiError::DecodeError("Encrypted key is missing DEK-Info".to_string()))?;
    let dek = DekInfo::parse(dek)?;

    let plaintext = pem_encryption::decrypt(&dek, passphrase.as_bytes(), block.contents())?;
    // Garbage from a wrong passphrase occasionally survives the padding check.
    KeyPair::from_pkcs1_der(&plaintext).map_err(|_| PkiError::InvalidPasswordError)
}

/// Decode a certificate and its private key.
pub fn decode_certificate_and_key(
    cert_pem: &[u8],
    key_pem: &[u8],
    passphrase: Option<&str>,
) -> Result<(IssuedCertificate, KeyPair)> {
    let certificate = decode_certificate(cert_pem)?;
    let key = decode_private_key(key_pem, passphrase)?;
    Ok((certificate, key))
}
