//! Cryptographic operations module.
//!
//! This module provides the primitives the certificate engine builds on:
//!
//! - 2048-bit RSA key generation fed by an entropy source
//! - SHA-256 / PKCS#1 v1.5 signing and verification
//! - Legacy OpenSSL encrypted-PEM key protection
//!
//! # Example
//!
//! ```rust,no_run
//! use kmspki::crypto::rsa::KeyPair;
//! use kmspki::entropy::OsEntropy;
//!
//! # fn example() -> kmspki::error::Result<()> {
//! let keypair = KeyPair::generate(&OsEntropy)?;
//! let signature = keypair.sign(b"message")?;
//! keypair.verify(b"message", &signature)?;
//! # Ok(())
//! # }
//! ```

pub mod pem_encryption;
pub mod rsa;
