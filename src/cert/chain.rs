//! Certificate chain bundles.
//!
//! A bundle is a sequence of `CERTIFICATE` blocks ordered leaf first, each
//! certificate issued by the one that follows it.

use crate::cert::certificate::IssuedCertificate;
use crate::cert::codec::{encode_certificate, CERTIFICATE_LABEL};
use crate::error::{PkiError, Result};

/// Concatenate certificates into one PEM bundle.
///
/// # Arguments
///
/// * `chain` - Certificates ordered leaf first
pub fn build_chain_pem(chain: &[&IssuedCertificate]) -> String {
    chain.iter().map(|cert| encode_certificate(cert)).collect()
}

/// Parse every `CERTIFICATE` block in a bundle. Other block types are skipped.
pub fn split_chain_pem(input: &[u8]) -> Result<Vec<IssuedCertificate>> {
    let blocks = ::pem::parse_many(input)
        .map_err(|e| PkiError::DecodeError(format!("Failed to parse PEM bundle: {}", e)))?;

    let certificates = blocks
        .iter()
        .filter(|block| block.tag() == CERTIFICATE_LABEL)
        .map(|block| IssuedCertificate::from_der(block.contents()))
        .collect::<Result<Vec<_>>>()?;

    if certificates.is_empty() {
        return Err(PkiError::DecodeError(
            "No certificates found in bundle".to_string(),
        ));
    }
    Ok(certificates)
}

/// Check each certificate is issued by its successor and the last is a self-signed root.
pub fn verify_chain(chain: &[IssuedCertificate]) -> Result<()> {
    let root = chain
        .last()
        .ok_or_else(|| PkiError::CertificateError("Empty certificate chain".to_string()))?;

    for pair in chain.windows(2) {
        if !pair[1].is_ca() {
            return Err(PkiError::CertificateError(format!(
                "Issuer '{}' is not a CA",
                pair[1].subject()
            )));
        }
        pair[0].verify_issued_by(&pair[1])?;
    }

    root.verify_issued_by(root)
}
