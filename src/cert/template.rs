//! Certificate templates and TBS signing.
//!
//! A template captures everything that goes into a `TbsCertificate` except
//! the serial number and the moment of issuance, which are supplied when the
//! template is rendered.

use crate::cert::csr::CertificateRequest;
use crate::cert::extensions::{
    encode_extension, subject_alt_name, ANY_EXTENDED_KEY_USAGE, ID_KP_CLIENT_AUTH,
    ID_KP_SERVER_AUTH,
};
use crate::config::SERIAL_NUMBER_LEN;
use crate::crypto::rsa::{public_key_from_spki, public_key_pkcs1_der, KeyPair};
use crate::entropy::EntropySource;
use crate::error::{PkiError, Result};
use const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION;
use der::asn1::{BitString, GeneralizedTime, OctetString, UtcTime};
use der::{Any, DateTime, Encode};
use sha1::{Digest, Sha1};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

/// UTCTime can only represent years before 2050.
const UTC_TIME_MAX_YEAR: u16 = 2049;

/// `sha256WithRSAEncryption` with explicit NULL parameters.
pub fn sha256_with_rsa() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: SHA_256_WITH_RSA_ENCRYPTION,
        parameters: Some(Any::null()),
    }
}

/// True when `algorithm` is `sha256WithRSAEncryption` with NULL or absent parameters.
pub fn is_sha256_with_rsa(algorithm: &AlgorithmIdentifierOwned) -> bool {
    algorithm.oid == SHA_256_WITH_RSA_ENCRYPTION
        && match &algorithm.parameters {
            None => true,
            Some(params) => params == &Any::null(),
        }
}

/// Draw a positive serial number from `entropy`.
///
/// The top bit of the first byte is cleared so the DER integer is never
/// negative, and an all-zero draw is bumped to one.
pub fn generate_serial_number<E: EntropySource + ?Sized>(entropy: &E) -> Result<SerialNumber> {
    let mut bytes = [0u8; SERIAL_NUMBER_LEN];
    entropy.fill(&mut bytes)?;
    bytes[0] &= 0x7f;
    if bytes.iter().all(|b| *b == 0) {
        bytes[SERIAL_NUMBER_LEN - 1] = 1;
    }

    SerialNumber::new(&bytes)
        .map_err(|e| PkiError::CertificateError(format!("Invalid serial number: {}", e)))
}

/// Validity window `[not_before, not_before + duration]`.
pub fn validity(not_before: SystemTime, duration: Duration) -> Result<Validity> {
    let not_after = not_before.checked_add(duration).ok_or_else(|| {
        PkiError::CertificateError("Validity period overflows".to_string())
    })?;

    Ok(Validity {
        not_before: to_time(not_before)?,
        not_after: to_time(not_after)?,
    })
}

/// Encode a point in time, using UTCTime through 2049 and GeneralizedTime after.
pub fn to_time(time: SystemTime) -> Result<Time> {
    let since_epoch = time
        .duration_since(UNIX_EPOCH)
        .map_err(|e| PkiError::CertificateError(format!("Time before the epoch: {}", e)))?;
    // Certificates carry whole seconds.
    let date_time = DateTime::from_unix_duration(Duration::from_secs(since_epoch.as_secs()))
        .map_err(|e| PkiError::CertificateError(format!("Time out of range: {}", e)))?;

    if date_time.year() <= UTC_TIME_MAX_YEAR {
        let utc = UtcTime::from_date_time(date_time)
            .map_err(|e| PkiError::CertificateError(format!("Invalid UTCTime: {}", e)))?;
        Ok(Time::UtcTime(utc))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

/// SHA-1 over the PKCS#1 encoding of the subject public key.
pub fn subject_key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Result<Vec<u8>> {
    let public = public_key_from_spki(spki)?;
    let der = public_key_pkcs1_der(&public)?;
    Ok(Sha1::digest(&der).to_vec())
}

/// Fields of a self-issued root CA certificate.
#[derive(Debug, Clone)]
pub struct RootTemplate {
    subject: Name,
    public_key: SubjectPublicKeyInfoOwned,
    subject_key_id: Vec<u8>,
    duration: Duration,
}

impl RootTemplate {
    /// Take subject and public key from `csr`; the issuer will equal the subject.
    pub fn from_request(csr: &CertificateRequest, duration: Duration) -> Result<Self> {
        let public_key = csr.public_key_info().clone();
        let subject_key_id = subject_key_identifier(&public_key)?;
        Ok(Self {
            subject: csr.subject().clone(),
            public_key,
            subject_key_id,
            duration,
        })
    }

    pub fn subject_key_id(&self) -> &[u8] {
        &self.subject_key_id
    }

    /// BasicConstraints (CA), KeyUsage (cert sign, digital signature, CRL sign) and SKI.
    pub fn extensions(&self) -> Result<Vec<Extension>> {
        let ski = OctetString::new(self.subject_key_id.clone())
            .map_err(|e| PkiError::CertificateError(format!("Invalid key identifier: {}", e)))?;

        Ok(vec![
            encode_extension(
                &KeyUsage(KeyUsages::KeyCertSign | KeyUsages::DigitalSignature | KeyUsages::CRLSign),
                true,
            )?,
            encode_extension(
                &BasicConstraints {
                    ca: true,
                    path_len_constraint: None,
                },
                true,
            )?,
            encode_extension(&SubjectKeyIdentifier(ski), false)?,
        ])
    }

    pub fn to_tbs(&self, serial_number: SerialNumber, now: SystemTime) -> Result<TbsCertificate> {
        build_tbs(
            serial_number,
            self.subject.clone(),
            self.subject.clone(),
            self.public_key.clone(),
            validity(now, self.duration)?,
            self.extensions()?,
        )
    }
}

/// Fields of an end-entity certificate issued by a CA.
#[derive(Debug, Clone)]
pub struct LeafTemplate {
    issuer: Name,
    subject: Name,
    public_key: SubjectPublicKeyInfoOwned,
    dns_names: Vec<String>,
    authority_key_id: Option<Vec<u8>>,
    duration: Duration,
}

impl LeafTemplate {
    /// Take subject, public key and DNS names from `csr`.
    ///
    /// `authority_key_id` is the issuing CA's subject key identifier, if it has one.
    pub fn from_request(
        csr: &CertificateRequest,
        issuer: &Name,
        authority_key_id: Option<&[u8]>,
        duration: Duration,
    ) -> Self {
        Self {
            issuer: issuer.clone(),
            subject: csr.subject().clone(),
            public_key: csr.public_key_info().clone(),
            dns_names: csr.dns_names().to_vec(),
            authority_key_id: authority_key_id.map(<[u8]>::to_vec),
            duration,
        }
    }

    /// KeyUsage (digital signature, key encipherment), ExtendedKeyUsage, SAN and AKI.
    pub fn extensions(&self) -> Result<Vec<Extension>> {
        let mut extensions = vec![
            encode_extension(
                &KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
                true,
            )?,
            encode_extension(
                &ExtendedKeyUsage(vec![
                    ANY_EXTENDED_KEY_USAGE,
                    ID_KP_SERVER_AUTH,
                    ID_KP_CLIENT_AUTH,
                ]),
                false,
            )?,
        ];
        if !self.dns_names.is_empty() {
            extensions.push(encode_extension(&subject_alt_name(&self.dns_names)?, false)?);
        }
        if let Some(key_id) = &self.authority_key_id {
            let key_identifier = OctetString::new(key_id.clone()).map_err(|e| {
                PkiError::CertificateError(format!("Invalid key identifier: {}", e))
            })?;
            extensions.push(encode_extension(
                &AuthorityKeyIdentifier {
                    key_identifier: Some(key_identifier),
                    authority_cert_issuer: None,
                    authority_cert_serial_number: None,
                },
                false,
            )?);
        }
        Ok(extensions)
    }

    pub fn to_tbs(&self, serial_number: SerialNumber, now: SystemTime) -> Result<TbsCertificate> {
        build_tbs(
            serial_number,
            self.issuer.clone(),
            self.subject.clone(),
            self.public_key.clone(),
            validity(now, self.duration)?,
            self.extensions()?,
        )
    }
}

fn build_tbs(
    serial_number: SerialNumber,
    issuer: Name,
    subject: Name,
    subject_public_key_info: SubjectPublicKeyInfoOwned,
    validity: Validity,
    extensions: Vec<Extension>,
) -> Result<TbsCertificate> {
    Ok(TbsCertificate {
        version: Version::V3,
        serial_number,
        signature: sha256_with_rsa(),
        issuer,
        validity,
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    })
}

/// Sign `tbs` with `key` and assemble the certificate.
pub fn sign_tbs(tbs: TbsCertificate, key: &KeyPair) -> Result<Certificate> {
    let tbs_der = tbs
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode TBS certificate: {}", e)))?;

    let signature = key.sign(&tbs_der)?;
    let signature = BitString::from_bytes(&signature)
        .map_err(|e| PkiError::SignatureGeneration(format!("Failed to wrap signature: {}", e)))?;

    Ok(Certificate {
        tbs_certificate: tbs,
        signature_algorithm: sha256_with_rsa(),
        signature,
    })
}
