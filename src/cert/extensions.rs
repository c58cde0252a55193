//! X.509 extension encoding and decoding helpers.

use crate::error::{PkiError, Result};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::{Ia5String, OctetString};
use der::{Decode, Encode};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName,
    SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;

/// anyExtendedKeyUsage (2.5.29.37.0)
pub const ANY_EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");

/// id-kp-serverAuth (1.3.6.1.5.5.7.3.1)
pub const ID_KP_SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");

/// id-kp-clientAuth (1.3.6.1.5.5.7.3.2)
pub const ID_KP_CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");

/// PKCS#9 extensionRequest attribute (1.2.840.113549.1.9.14)
pub const EXTENSION_REQUEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");

/// Wrap an extension value in an `Extension`.
pub fn encode_extension<E>(value: &E, critical: bool) -> Result<Extension>
where
    E: AssociatedOid + Encode,
{
    let der = value
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode extension {}: {}", E::OID, e)))?;
    let extn_value = OctetString::new(der)
        .map_err(|e| PkiError::CertificateError(format!("Failed to wrap extension {}: {}", E::OID, e)))?;

    Ok(Extension {
        extn_id: E::OID,
        critical,
        extn_value,
    })
}

/// Decode the first extension of type `E`, if present.
pub fn find_extension<E>(extensions: &[Extension]) -> Result<Option<E>>
where
    E: AssociatedOid + for<'a> Decode<'a>,
{
    extensions
        .iter()
        .find(|ext| ext.extn_id == E::OID)
        .map(|ext| {
            E::from_der(ext.extn_value.as_bytes()).map_err(|e| {
                PkiError::ParseError(format!("Malformed extension {}: {}", E::OID, e))
            })
        })
        .transpose()
}

/// A subjectAltName extension carrying DNS names.
pub fn subject_alt_name(dns_names: &[String]) -> Result<SubjectAltName> {
    let names = dns_names
        .iter()
        .map(|name| {
            Ia5String::new(name)
                .map(GeneralName::DnsName)
                .map_err(|e| PkiError::ParseError(format!("Invalid DNS name '{}': {}", name, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SubjectAltName(names))
}

/// DNS names from a subjectAltName extension, in order. Other name forms are ignored.
pub fn dns_names(extensions: &[Extension]) -> Result<Vec<String>> {
    let san = match find_extension::<SubjectAltName>(extensions)? {
        Some(san) => san,
        None => return Ok(Vec::new()),
    };

    Ok(san
        .0
        .iter()
        .filter_map(|name| match name {
            GeneralName::DnsName(dns) => Some(dns.to_string()),
            _ => None,
        })
        .collect())
}

/// Parsed view of the extensions the issuing engine cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSummary {
    pub is_ca: bool,
    pub key_usage: Option<KeyUsage>,
    pub extended_key_usage: Vec<ObjectIdentifier>,
    pub dns_names: Vec<String>,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
}

impl ExtensionSummary {
    pub fn from_extensions(extensions: &[Extension]) -> Result<Self> {
        let is_ca = find_extension::<BasicConstraints>(extensions)?
            .map(|bc| bc.ca)
            .unwrap_or(false);
        let key_usage = find_extension::<KeyUsage>(extensions)?;
        let extended_key_usage = find_extension::<ExtendedKeyUsage>(extensions)?
            .map(|eku| eku.0)
            .unwrap_or_default();
        let subject_key_id = find_extension::<SubjectKeyIdentifier>(extensions)?
            .map(|ski| ski.0.as_bytes().to_vec());
        let authority_key_id = find_extension::<AuthorityKeyIdentifier>(extensions)?
            .and_then(|aki| aki.key_identifier)
            .map(|id| id.as_bytes().to_vec());

        Ok(Self {
            is_ca,
            key_usage,
            extended_key_usage,
            dns_names: dns_names(extensions)?,
            subject_key_id,
            authority_key_id,
        })
    }
}
