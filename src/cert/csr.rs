//! PKCS#10 certificate signing requests.

use crate::cert::extensions::{encode_extension, subject_alt_name, EXTENSION_REQUEST};
use crate::cert::name::{common_name, Subject};
use crate::cert::template::{is_sha256_with_rsa, sha256_with_rsa};
use crate::crypto::rsa::{public_key_from_spki, verify_signature, KeyPair};
use crate::entropy::EntropySource;
use crate::error::{PkiError, Result};
use der::asn1::{BitString, SetOfVec};
use der::{Any, Decode, Encode};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::{debug, info};
use x509_cert::attr::Attribute;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};

/// A parsed signing request whose self-signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    inner: CertReq,
    der: Vec<u8>,
    dns_names: Vec<String>,
}

impl CertificateRequest {
    /// Parse a DER-encoded request and verify its signature.
    ///
    /// Non-canonical encodings are rejected so the bytes that were checked
    /// are the bytes that get re-emitted.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let csr = Self::parse(der)?;
        csr.verify_signature()?;
        Ok(csr)
    }

    fn parse(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der)
            .map_err(|e| PkiError::ParseError(format!("Invalid certificate request: {}", e)))?;

        let reencoded = inner
            .to_der()
            .map_err(|e| PkiError::ParseError(format!("Failed to re-encode request: {}", e)))?;
        if reencoded != der {
            return Err(PkiError::ParseError(
                "Certificate request is not canonical DER".to_string(),
            ));
        }

        let dns_names = requested_dns_names(&inner.info)?;
        Ok(Self {
            inner,
            der: der.to_vec(),
            dns_names,
        })
    }

    /// Check the request is signed by the key it carries.
    pub fn verify_signature(&self) -> Result<()> {
        if !is_sha256_with_rsa(&self.inner.algorithm) {
            return Err(PkiError::SignatureInvalid(format!(
                "Unsupported signature algorithm: {}",
                self.inner.algorithm.oid
            )));
        }

        let info_der = self
            .inner
            .info
            .to_der()
            .map_err(|e| PkiError::ParseError(format!("Failed to encode request info: {}", e)))?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            PkiError::SignatureInvalid("Signature has unused bits".to_string())
        })?;
        let public = public_key_from_spki(&self.inner.info.public_key)?;

        verify_signature(&public, &info_der, signature)
    }

    pub fn subject(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn common_name(&self) -> Option<String> {
        common_name(self.subject())
    }

    /// DNS names from the request's subjectAltName, in request order.
    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    pub fn signature_algorithm(&self) -> &AlgorithmIdentifierOwned {
        &self.inner.algorithm
    }

    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    pub fn inner(&self) -> &CertReq {
        &self.inner
    }
}

/// Generate a fresh keypair and a request signed by it.
///
/// The subject's common name is appended to `alt_names` when not already
/// present, so the request always names its own CN as a DNS SAN.
///
/// # Example
///
/// ```no_run
/// use kmspki::cert::csr::create_csr;
/// use kmspki::cert::name::Subject;
/// use kmspki::entropy::OsEntropy;
///
/// let (csr, _key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
/// assert_eq!(csr.dns_names(), ["root.example"]);
/// ```
pub fn create_csr<E: EntropySource + ?Sized>(
    subject: &Subject,
    alt_names: &[String],
    entropy: &E,
) -> Result<(CertificateRequest, KeyPair)> {
    let name = subject.to_name()?;
    let keypair = KeyPair::generate(entropy)?;

    let mut dns_names = alt_names.to_vec();
    if !dns_names.iter().any(|n| *n == subject.common_name) {
        dns_names.push(subject.common_name.clone());
    }

    let info = CertReqInfo {
        version: Version::V1,
        subject: name,
        public_key: keypair.public_key_info()?,
        attributes: extension_request(&dns_names)?,
    };

    let info_der = info
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode request info: {}", e)))?;
    let signature = keypair.sign(&info_der)?;
    let signature = BitString::from_bytes(&signature)
        .map_err(|e| PkiError::SignatureGeneration(format!("Failed to wrap signature: {}", e)))?;

    let request = CertReq {
        info,
        algorithm: sha256_with_rsa(),
        signature,
    };
    let der = request
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode request: {}", e)))?;

    let csr = CertificateRequest::parse(&der)?;
    csr.verify_signature().map_err(|e| {
        PkiError::SignatureGeneration(format!("Freshly signed request does not verify: {}", e))
    })?;

    info!(
        subject = %csr.subject(),
        sans = ?csr.dns_names(),
        "created certificate request"
    );
    Ok((csr, keypair))
}

fn extension_request(dns_names: &[String]) -> Result<SetOfVec<Attribute>> {
    let extensions = vec![encode_extension(&subject_alt_name(dns_names)?, false)?];
    let encoded = extensions
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode extensions: {}", e)))?;
    let value = Any::from_der(&encoded)
        .map_err(|e| PkiError::CertificateError(format!("Failed to wrap extensions: {}", e)))?;

    let mut values = SetOfVec::new();
    values
        .insert_ordered(value)
        .map_err(|e| PkiError::CertificateError(format!("Failed to add attribute value: {}", e)))?;

    let mut attributes = SetOfVec::new();
    attributes
        .insert_ordered(Attribute {
            oid: EXTENSION_REQUEST,
            values,
        })
        .map_err(|e| PkiError::CertificateError(format!("Failed to add attribute: {}", e)))?;
    Ok(attributes)
}

fn requested_dns_names(info: &CertReqInfo) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for attribute in info.attributes.iter().filter(|a| a.oid == EXTENSION_REQUEST) {
        for value in attribute.values.iter() {
            let encoded = value
                .to_der()
                .map_err(|e| PkiError::ParseError(format!("Malformed extension request: {}", e)))?;
            let extensions = Vec::<Extension>::from_der(&encoded)
                .map_err(|e| PkiError::ParseError(format!("Malformed extension request: {}", e)))?;
            names.extend(crate::cert::extensions::dns_names(&extensions)?);
        }
    }
    debug!(count = names.len(), "parsed requested DNS names");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::name::parse_subject;
    use crate::entropy::mock::{FailingProvider, MockKms};
    use crate::entropy::{ChunkedEntropy, OsEntropy};

    #[test]
    fn test_create_csr_appends_common_name() {
        let (csr, key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        assert_eq!(csr.dns_names(), ["root.example"]);
        assert_eq!(csr.common_name().as_deref(), Some("root.example"));
        assert!(key.matches_public_key_info(csr.public_key_info()));
    }

    #[test]
    fn test_create_csr_keeps_given_order() {
        let sans = vec!["alt.example".to_string()];
        let (csr, _) = create_csr(&Subject::new("leaf.example"), &sans, &OsEntropy).unwrap();
        assert_eq!(csr.dns_names(), ["alt.example", "leaf.example"]);
    }

    #[test]
    fn test_create_csr_does_not_duplicate_common_name() {
        let sans = vec!["leaf.example".to_string(), "alt.example".to_string()];
        let (csr, _) = create_csr(&Subject::new("leaf.example"), &sans, &OsEntropy).unwrap();
        assert_eq!(csr.dns_names(), ["leaf.example", "alt.example"]);
    }

    #[test]
    fn test_create_csr_full_subject() {
        let subject = parse_subject("CN=host.example,O=Example Org,C=GB").unwrap();
        let (csr, _) = create_csr(&subject, &[], &OsEntropy).unwrap();
        assert_eq!(csr.subject(), &subject.to_name().unwrap());
        assert!(csr.signature_algorithm() == &sha256_with_rsa());
    }

    #[test]
    fn test_create_csr_with_chunked_entropy() {
        let entropy = ChunkedEntropy::new(MockKms::new());
        let (csr, _) = create_csr(&Subject::new("mock.example"), &[], &entropy).unwrap();
        assert!(csr.verify_signature().is_ok());
        assert!(entropy.provider().calls() > 0);
    }

    #[test]
    fn test_create_csr_entropy_failure() {
        let entropy = ChunkedEntropy::new(FailingProvider::new(1, 0));
        let result = create_csr(&Subject::new("x.example"), &[], &entropy);
        assert!(matches!(result, Err(PkiError::ProviderFailure { .. })));
    }

    #[test]
    fn test_create_csr_empty_common_name() {
        let result = create_csr(&Subject::default(), &[], &OsEntropy);
        assert!(matches!(result, Err(PkiError::ParseError(_))));
    }

    #[test]
    fn test_from_der_roundtrip() {
        let (csr, _) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let parsed = CertificateRequest::from_der(csr.to_der()).unwrap();
        assert_eq!(parsed, csr);
    }

    #[test]
    fn test_from_der_rejects_every_single_byte_mutation() {
        let (csr, _) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let der = csr.to_der().to_vec();

        for i in 0..der.len() {
            let mut mutated = der.clone();
            mutated[i] ^= 0x01;
            assert!(
                CertificateRequest::from_der(&mutated).is_err(),
                "mutation at byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_from_der_rejects_signature_tampering() {
        let (csr, _) = create_csr(&Subject::new("root.example"), &[], &OsEntropy).unwrap();
        let mut der = csr.to_der().to_vec();
        let last = der.len() - 1;
        der[last] ^= 0xff;

        match CertificateRequest::from_der(&der) {
            Err(PkiError::SignatureInvalid(_)) => {}
            other => panic!("Expected SignatureInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_from_der_garbage() {
        assert!(matches!(
            CertificateRequest::from_der(b"not a csr"),
            Err(PkiError::ParseError(_))
        ));
    }
}
