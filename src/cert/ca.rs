//! Root CA issuance.
//!
//! A root is issued from a signing request and the private key that made it:
//! issuer and subject are the request's subject, the certificate is marked
//! as a CA and carries a subject key identifier.

use crate::cert::certificate::IssuedCertificate;
use crate::cert::codec;
use crate::cert::csr::{create_csr, CertificateRequest};
use crate::cert::name::Subject;
use crate::cert::signer::sign_leaf;
use crate::cert::template::{generate_serial_number, sign_tbs, RootTemplate};
use crate::crypto::rsa::KeyPair;
use crate::entropy::EntropySource;
use crate::error::{PkiError, Result};
use der::Encode;
use std::time::{Duration, SystemTime};
use tracing::info;

/// Issue a self-signed root CA certificate for `csr`, signed by `key`.
///
/// # Arguments
///
/// * `csr` - A verified request carrying the CA subject and public key
/// * `key` - The private key matching the request's public key
/// * `duration` - How long the certificate is valid from now
/// * `entropy` - Source for the serial number
///
/// # Example
///
/// ```no_run
/// use kmspki::cert::ca::issue_root;
/// use kmspki::cert::csr::create_csr;
/// use kmspki::cert::name::Subject;
/// use kmspki::config::days;
/// use kmspki::entropy::OsEntropy;
///
/// # fn example() -> kmspki::error::Result<()> {
/// let (csr, key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy)?;
/// let root = issue_root(&csr, &key, days(7300), &OsEntropy)?;
/// assert!(root.is_ca());
/// # Ok(())
/// # }
/// ```
pub fn issue_root<E: EntropySource + ?Sized>(
    csr: &CertificateRequest,
    key: &KeyPair,
    duration: Duration,
    entropy: &E,
) -> Result<IssuedCertificate> {
    if !key.matches_public_key_info(csr.public_key_info()) {
        return Err(PkiError::KeyMismatch(
            "Private key does not match the request's public key".to_string(),
        ));
    }

    let serial_number = generate_serial_number(entropy)?;
    let template = RootTemplate::from_request(csr, duration)?;
    let tbs = template.to_tbs(serial_number, SystemTime::now())?;
    let certificate = sign_tbs(tbs, key)?;

    let der = certificate
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode certificate: {}", e)))?;
    let issued = IssuedCertificate::from_der(&der)?;
    issued.verify_issued_by(&issued).map_err(|e| {
        PkiError::SignatureGeneration(format!("Root certificate does not self-verify: {}", e))
    })?;

    info!(
        subject = %issued.subject(),
        serial = %issued.serial_hex(),
        "issued root CA certificate"
    );
    Ok(issued)
}

/// A CA certificate paired with its private key.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    certificate: IssuedCertificate,
    key: KeyPair,
}

impl CertificateAuthority {
    /// Pair a CA certificate with its key.
    ///
    /// Fails if the certificate is not a CA or the key does not match it.
    pub fn new(certificate: IssuedCertificate, key: KeyPair) -> Result<Self> {
        if !certificate.is_ca() {
            return Err(PkiError::CertificateError(format!(
                "Certificate '{}' is not a CA",
                certificate.subject()
            )));
        }
        if !key.matches_public_key_info(certificate.public_key_info()) {
            return Err(PkiError::KeyMismatch(format!(
                "Private key does not match CA certificate '{}'",
                certificate.subject()
            )));
        }
        Ok(Self { certificate, key })
    }

    /// Create a new root: fresh key, request and self-signed certificate.
    pub fn create<E: EntropySource + ?Sized>(
        subject: &Subject,
        duration: Duration,
        entropy: &E,
    ) -> Result<Self> {
        let (csr, key) = create_csr(subject, &[], entropy)?;
        let certificate = issue_root(&csr, &key, duration, entropy)?;
        Ok(Self { certificate, key })
    }

    /// Load a CA from PEM-encoded certificate and key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], passphrase: Option<&str>) -> Result<Self> {
        let (certificate, key) = codec::decode_certificate_and_key(cert_pem, key_pem, passphrase)?;
        Self::new(certificate, key)
    }

    pub fn certificate(&self) -> &IssuedCertificate {
        &self.certificate
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    /// Sign a leaf certificate for `csr`.
    pub fn sign_leaf<E: EntropySource + ?Sized>(
        &self,
        csr: &CertificateRequest,
        duration: Duration,
        entropy: &E,
    ) -> Result<IssuedCertificate> {
        sign_leaf(csr, &self.certificate, &self.key, duration, entropy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::ANY_EXTENDED_KEY_USAGE;
    use crate::cert::name::parse_subject;
    use crate::cert::template::subject_key_identifier;
    use crate::config::days;
    use crate::entropy::OsEntropy;
    use x509_cert::ext::pkix::KeyUsages;

    #[test]
    fn test_issue_root_basic_properties() {
        let (csr, key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let root = issue_root(&csr, &key, days(7300), &OsEntropy).unwrap();

        assert!(root.is_ca());
        assert!(root.is_self_issued());
        assert_eq!(root.subject(), csr.subject());
        assert!(root.verify_issued_by(&root).is_ok());
        assert_eq!(root.public_key_info(), csr.public_key_info());
    }

    #[test]
    fn test_issue_root_key_usage() {
        let (csr, key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let root = issue_root(&csr, &key, days(365), &OsEntropy).unwrap();

        let usage = root.key_usage().unwrap().0;
        assert!(usage.contains(KeyUsages::KeyCertSign));
        assert!(usage.contains(KeyUsages::DigitalSignature));
        assert!(usage.contains(KeyUsages::CRLSign));
        assert!(!root.extended_key_usage().contains(&ANY_EXTENDED_KEY_USAGE));
    }

    #[test]
    fn test_issue_root_subject_key_identifier() {
        let (csr, key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let root = issue_root(&csr, &key, days(365), &OsEntropy).unwrap();

        let expected = subject_key_identifier(csr.public_key_info()).unwrap();
        assert_eq!(root.subject_key_identifier(), Some(expected.as_slice()));
        assert_eq!(expected.len(), 20);
    }

    #[test]
    fn test_issue_root_validity() {
        let (csr, key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let root = issue_root(&csr, &key, days(7300), &OsEntropy).unwrap();

        let lifetime = root.not_after().duration_since(root.not_before()).unwrap();
        assert_eq!(lifetime, days(7300));
        assert!(root.not_before() <= SystemTime::now());
    }

    #[test]
    fn test_issue_root_key_mismatch() {
        let (csr, _) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let other = KeyPair::generate(&OsEntropy).unwrap();

        match issue_root(&csr, &other, days(365), &OsEntropy) {
            Err(PkiError::KeyMismatch(_)) => {}
            _ => panic!("Expected KeyMismatch"),
        }
    }

    #[test]
    fn test_issue_root_serials_differ() {
        let (csr, key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let a = issue_root(&csr, &key, days(365), &OsEntropy).unwrap();
        let b = issue_root(&csr, &key, days(365), &OsEntropy).unwrap();
        assert_ne!(a.serial_number(), b.serial_number());
    }

    #[test]
    fn test_create_authority() {
        let subject = parse_subject("CN=Test Root CA,O=Test Org,C=US").unwrap();
        let ca = CertificateAuthority::create(&subject, days(365), &OsEntropy).unwrap();
        assert!(ca.certificate().is_ca());
        assert_eq!(ca.certificate().common_name().as_deref(), Some("Test Root CA"));
    }

    #[test]
    fn test_authority_rejects_mismatched_key() {
        let ca = CertificateAuthority::create(&Subject::new("root.example"), days(365), &OsEntropy).unwrap();
        let other = KeyPair::generate(&OsEntropy).unwrap();

        match CertificateAuthority::new(ca.certificate().clone(), other) {
            Err(PkiError::KeyMismatch(_)) => {}
            _ => panic!("Expected KeyMismatch"),
        }
    }

    #[test]
    fn test_authority_rejects_leaf_certificate() {
        let ca = CertificateAuthority::create(&Subject::new("root.example"), days(365), &OsEntropy).unwrap();
        let (csr, key) = create_csr(&Subject::new("leaf.example"), &[], &OsEntropy).unwrap();
        let leaf = ca.sign_leaf(&csr, days(30), &OsEntropy).unwrap();

        match CertificateAuthority::new(leaf, key) {
            Err(PkiError::CertificateError(msg)) => assert!(msg.contains("not a CA")),
            _ => panic!("Expected CertificateError"),
        }
    }
}
