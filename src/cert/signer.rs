//! Leaf certificate signing.

use crate::cert::certificate::IssuedCertificate;
use crate::cert::csr::CertificateRequest;
use crate::cert::template::{generate_serial_number, sign_tbs, LeafTemplate};
use crate::crypto::rsa::KeyPair;
use crate::entropy::EntropySource;
use crate::error::{PkiError, Result};
use der::Encode;
use std::time::{Duration, SystemTime};
use tracing::info;

/// Sign an end-entity certificate for `csr` with the CA's key.
///
/// The subject, public key and DNS names come from the request; the issuer
/// is the CA certificate's subject. The result is checked against the CA
/// before it is returned.
///
/// # Example
///
/// ```no_run
/// use kmspki::cert::ca::CertificateAuthority;
/// use kmspki::cert::csr::create_csr;
/// use kmspki::cert::name::Subject;
/// use kmspki::cert::signer::sign_leaf;
/// use kmspki::config::days;
/// use kmspki::entropy::OsEntropy;
///
/// # fn example() -> kmspki::error::Result<()> {
/// let ca = CertificateAuthority::create(&Subject::new("root.example"), days(7300), &OsEntropy)?;
/// let sans = vec!["alt.example".to_string()];
/// let (csr, _key) = create_csr(&Subject::new("leaf.example"), &sans, &OsEntropy)?;
/// let leaf = sign_leaf(&csr, ca.certificate(), ca.key(), days(730), &OsEntropy)?;
/// assert!(leaf.verify_issued_by(ca.certificate()).is_ok());
/// # Ok(())
/// # }
/// ```
pub fn sign_leaf<E: EntropySource + ?Sized>(
    csr: &CertificateRequest,
    ca_certificate: &IssuedCertificate,
    ca_key: &KeyPair,
    duration: Duration,
    entropy: &E,
) -> Result<IssuedCertificate> {
    if !ca_key.matches_public_key_info(ca_certificate.public_key_info()) {
        return Err(PkiError::KeyMismatch(format!(
            "CA key does not match certificate '{}'",
            ca_certificate.subject()
        )));
    }

    let serial_number = generate_serial_number(entropy)?;
    let template = LeafTemplate::from_request(
        csr,
        ca_certificate.subject(),
        ca_certificate.subject_key_identifier(),
        duration,
    );
    let tbs = template.to_tbs(serial_number, SystemTime::now())?;
    let certificate = sign_tbs(tbs, ca_key)?;

    let der = certificate
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode certificate: {}", e)))?;
    let issued = IssuedCertificate::from_der(&der)?;
    issued.verify_issued_by(ca_certificate).map_err(|e| {
        PkiError::SignatureGeneration(format!("Signed certificate does not verify: {}", e))
    })?;

    info!(
        subject = %issued.subject(),
        issuer = %issued.issuer(),
        serial = %issued.serial_hex(),
        "signed leaf certificate"
    );
    Ok(issued)
}
