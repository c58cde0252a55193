//! Distinguished names.
//!
//! A [`Subject`] holds the fields the issuing tools expose (common name,
//! country, province, locality, organization, organizational unit) and encodes
//! them as an X.509 RDN sequence in the conventional order:
//! C, ST, L, O, OU, CN.

use crate::error::{PkiError, Result};
use const_oid::db::rfc4519;
use const_oid::ObjectIdentifier;
use der::asn1::{PrintableStringRef, SetOfVec, Utf8StringRef};
use der::Any;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

/// Subject fields of a certificate or signing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    pub common_name: String,
    pub country: Vec<String>,
    pub province: Vec<String>,
    pub locality: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
}

impl Subject {
    /// A subject with only a common name.
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Self::default()
        }
    }

    /// Encode as an RDN sequence, one RDN per value.
    ///
    /// # Example
    ///
    /// ```
    /// use kmspki::cert::name::{common_name, Subject};
    ///
    /// let mut subject = Subject::new("root.example");
    /// subject.organization.push("Example Org".to_string());
    /// let name = subject.to_name().unwrap();
    /// assert_eq!(name.0.len(), 2);
    /// assert_eq!(common_name(&name).as_deref(), Some("root.example"));
    /// ```
    pub fn to_name(&self) -> Result<Name> {
        if self.common_name.is_empty() {
            return Err(PkiError::ParseError(
                "Subject common name cannot be empty".to_string(),
            ));
        }

        let mut rdns = Vec::new();
        for value in &self.country {
            rdns.push(rdn(printable_attr(rfc4519::C, value)?)?);
        }
        for (oid, values) in [
            (rfc4519::ST, &self.province),
            (rfc4519::L, &self.locality),
            (rfc4519::O, &self.organization),
            (rfc4519::OU, &self.organizational_unit),
        ] {
            for value in values {
                rdns.push(rdn(utf8_attr(oid, value)?)?);
            }
        }
        rdns.push(rdn(utf8_attr(rfc4519::CN, &self.common_name)?)?);

        Ok(RdnSequence(rdns))
    }
}

/// Parse a subject string (e.g., "CN=example.com,O=Example Org") into a [`Subject`].
///
/// # Example
///
/// ```
/// use kmspki::cert::name::parse_subject;
///
/// let subject = parse_subject("CN=example.com,O=Example Org").unwrap();
/// assert_eq!(subject.common_name, "example.com");
/// ```
pub fn parse_subject(subject: &str) -> Result<Subject> {
    let mut parsed = Subject::default();

    for part in subject.split(',') {
        let part = part.trim();
        let (key, value) = part.split_once('=').ok_or_else(|| {
            PkiError::ParseError(format!("Invalid subject format: {}", part))
        })?;
        let value = value.trim().to_string();

        match key.trim().to_uppercase().as_str() {
            "CN" => parsed.common_name = value,
            "C" => parsed.country.push(value),
            "ST" | "S" => parsed.province.push(value),
            "L" => parsed.locality.push(value),
            "O" => parsed.organization.push(value),
            "OU" => parsed.organizational_unit.push(value),
            other => return Err(PkiError::ParseError(format!("Unknown DN type: {}", other))),
        }
    }

    if parsed.common_name.is_empty() {
        return Err(PkiError::ParseError(
            "Subject must contain a CN".to_string(),
        ));
    }

    Ok(parsed)
}

/// First common name in `name`, if any.
pub fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == rfc4519::CN)
        .and_then(|atv| std::str::from_utf8(atv.value.value()).ok())
        .map(str::to_string)
}

fn utf8_attr(oid: ObjectIdentifier, value: &str) -> Result<AttributeTypeAndValue> {
    let value: Any = Utf8StringRef::new(value)
        .map_err(|e| PkiError::ParseError(format!("Invalid attribute value '{}': {}", value, e)))?
        .into();
    Ok(AttributeTypeAndValue { oid, value })
}

fn printable_attr(oid: ObjectIdentifier, value: &str) -> Result<AttributeTypeAndValue> {
    let value: Any = PrintableStringRef::new(value)
        .map_err(|e| PkiError::ParseError(format!("Invalid printable value '{}': {}", value, e)))?
        .into();
    Ok(AttributeTypeAndValue { oid, value })
}

fn rdn(attr: AttributeTypeAndValue) -> Result<RelativeDistinguishedName> {
    let mut attr_set = SetOfVec::new();
    attr_set
        .insert_ordered(attr)
        .map_err(|e| PkiError::CertificateError(format!("Failed to add attribute: {}", e)))?;
    Ok(RelativeDistinguishedName::from(attr_set))
}
