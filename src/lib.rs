//! kmspki: a small private X.509 PKI fed by a rate-limited entropy service
//!
//! This library issues RSA-2048 / SHA-256 certificates for a two-level
//! hierarchy. It enables users to:
//!
//! - Create PKCS#10 signing requests with a fresh keypair
//! - Issue a self-signed root CA certificate from a request
//! - Sign leaf certificates for requests with that CA
//! - Read and write certificates, requests and keys as PEM, including
//!   passphrase-protected keys
//!
//! All randomness (key generation, serial numbers, PEM encryption IVs) comes
//! from an [`entropy::EntropySource`] passed in by the caller. A
//! [`entropy::ChunkedEntropy`] adapts a remote provider that only hands out a
//! bounded number of bytes per call.
//!
//! # Example
//!
//! ```rust,no_run
//! use kmspki::cert::{create_csr, CertificateAuthority, Subject};
//! use kmspki::config::days;
//! use kmspki::entropy::OsEntropy;
//! use kmspki::error::Result;
//!
//! fn example() -> Result<()> {
//!     let ca = CertificateAuthority::create(&Subject::new("root.example"), days(7300), &OsEntropy)?;
//!     let (csr, _key) = create_csr(&Subject::new("leaf.example"), &[], &OsEntropy)?;
//!     let leaf = ca.sign_leaf(&csr, days(730), &OsEntropy)?;
//!     leaf.verify_issued_by(ca.certificate())?;
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod entropy;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use error::{PkiError, Result};
