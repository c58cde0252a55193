//! Certificate issuance module.
//!
//! This module covers the whole life of a certificate in a two-level
//! hierarchy: signing requests, a self-signed root CA, leaf certificates
//! signed by that root, and their PEM encodings.

pub mod ca;
pub mod certificate;
pub mod chain;
pub mod codec;
pub mod csr;
pub mod extensions;
pub mod name;
pub mod signer;
pub mod template;

pub use ca::{issue_root, CertificateAuthority};
pub use certificate::IssuedCertificate;
pub use csr::{create_csr, CertificateRequest};
pub use name::Subject;
pub use signer::sign_leaf;
