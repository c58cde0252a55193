//! Issued X.509 certificates.

use crate::cert::extensions::ExtensionSummary;
use crate::cert::name::common_name;
use crate::cert::template::is_sha256_with_rsa;
use crate::crypto::rsa::{public_key_from_spki, verify_signature};
use crate::error::{PkiError, Result};
use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use spki::SubjectPublicKeyInfoOwned;
use std::time::SystemTime;
use x509_cert::ext::pkix::KeyUsage;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

/// A parsed certificate together with its exact DER bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    inner: Certificate,
    der: Vec<u8>,
    summary: ExtensionSummary,
}

impl IssuedCertificate {
    /// Parse DER. The signature is not checked; see [`verify_issued_by`](Self::verify_issued_by).
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = Certificate::from_der(der)
            .map_err(|e| PkiError::ParseError(format!("Invalid certificate: {}", e)))?;
        let summary = match &inner.tbs_certificate.extensions {
            Some(extensions) => ExtensionSummary::from_extensions(extensions)?,
            None => ExtensionSummary::default(),
        };

        Ok(Self {
            inner,
            der: der.to_vec(),
            summary,
        })
    }

    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    pub fn inner(&self) -> &Certificate {
        &self.inner
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.inner.tbs_certificate.serial_number
    }

    /// Serial number as upper-case hex.
    pub fn serial_hex(&self) -> String {
        hex::encode_upper(self.serial_number().as_bytes())
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn common_name(&self) -> Option<String> {
        common_name(self.subject())
    }

    pub fn not_before(&self) -> SystemTime {
        self.inner.tbs_certificate.validity.not_before.to_system_time()
    }

    pub fn not_after(&self) -> SystemTime {
        self.inner.tbs_certificate.validity.not_after.to_system_time()
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    /// True when BasicConstraints marks this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        self.summary.is_ca
    }

    pub fn key_usage(&self) -> Option<&KeyUsage> {
        self.summary.key_usage.as_ref()
    }

    pub fn extended_key_usage(&self) -> &[ObjectIdentifier] {
        &self.summary.extended_key_usage
    }

    pub fn dns_names(&self) -> &[String] {
        &self.summary.dns_names
    }

    pub fn subject_key_identifier(&self) -> Option<&[u8]> {
        self.summary.subject_key_id.as_deref()
    }

    /// Key identifier from the authorityKeyIdentifier extension.
    pub fn authority_key_identifier(&self) -> Option<&[u8]> {
        self.summary.authority_key_id.as_deref()
    }

    /// True when issuer and subject are the same name.
    pub fn is_self_issued(&self) -> bool {
        self.issuer() == self.subject()
    }

    /// Check that `issuer` named and signed this certificate.
    pub fn verify_issued_by(&self, issuer: &IssuedCertificate) -> Result<()> {
        if self.issuer() != issuer.subject() {
            return Err(PkiError::SignatureInvalid(format!(
                "Issuer '{}' does not match CA subject '{}'",
                self.issuer(),
                issuer.subject()
            )));
        }
        if !is_sha256_with_rsa(&self.inner.signature_algorithm) {
            return Err(PkiError::SignatureInvalid(format!(
                "Unsupported signature algorithm: {}",
                self.inner.signature_algorithm.oid
            )));
        }

        let tbs_der = self
            .inner
            .tbs_certificate
            .to_der()
            .map_err(|e| PkiError::ParseError(format!("Failed to encode TBS certificate: {}", e)))?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            PkiError::SignatureInvalid("Signature has unused bits".to_string())
        })?;
        let public = public_key_from_spki(issuer.public_key_info())?;

        verify_signature(&public, &tbs_der, signature)
    }
}
