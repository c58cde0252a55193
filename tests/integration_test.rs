//! Integration tests for kmspki.
//!
//! These tests verify the complete workflows of the system.

use kmspki::cert::ca::{issue_root, CertificateAuthority};
use kmspki::cert::chain::{build_chain_pem, split_chain_pem, verify_chain};
use kmspki::cert::codec::{
    decode_certificate, decode_csr, decode_private_key, encode_certificate, encode_csr,
    encode_private_key, encode_private_key_encrypted,
};
use kmspki::cert::csr::{create_csr, CertificateRequest};
use kmspki::cert::name::{common_name, Subject};
use kmspki::config::{days, IssuanceConfig};
use kmspki::crypto::pem_encryption::PemCipher;
use kmspki::entropy::mock::{FailingProvider, MockKms};
use kmspki::entropy::{ChunkedEntropy, EntropySource, OsEntropy, OsRandomProvider};
use kmspki::error::{PkiError, Result};
use kmspki::storage::files::{
    ca_paths, certificate_path, csr_paths, load_certificate, load_certificate_authority, load_csr,
    write_certificate_file, write_csr_file, write_encrypted_private_key_file,
    write_private_key_file,
};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

#[test]
fn test_complete_issuance_workflow() -> Result<()> {
    // 1. Root request names its CN as the only SAN
    let (root_csr, root_key) = create_csr(&Subject::new("root.example"), &[], &OsEntropy)?;
    assert_eq!(root_csr.dns_names(), ["root.example"]);

    // 2. Twenty-year root
    let root = issue_root(&root_csr, &root_key, days(20 * 365), &OsEntropy)?;
    assert!(root.is_ca());
    assert_eq!(root.issuer(), root.subject());
    let lifetime = root.not_after().duration_since(root.not_before()).unwrap();
    assert_eq!(lifetime, days(7300));

    // 3. Leaf request with an extra SAN
    let sans = vec!["alt.example".to_string()];
    let (leaf_csr, leaf_key) = create_csr(&Subject::new("leaf.example"), &sans, &OsEntropy)?;
    assert_eq!(leaf_csr.dns_names(), ["alt.example", "leaf.example"]);

    // 4. Two-year leaf
    let ca = CertificateAuthority::new(root.clone(), root_key)?;
    let leaf = ca.sign_leaf(&leaf_csr, days(2 * 365), &OsEntropy)?;
    assert!(!leaf.is_ca());
    assert_eq!(common_name(leaf.issuer()).as_deref(), Some("root.example"));
    assert!(leaf.dns_names().contains(&"alt.example".to_string()));
    assert!(leaf_key.matches_public_key_info(leaf.public_key_info()));

    // 5. Verifies against its issuer only
    leaf.verify_issued_by(&root)?;
    let other = CertificateAuthority::create(&Subject::new("other.example"), days(365), &OsEntropy)?;
    assert!(leaf.verify_issued_by(other.certificate()).is_err());

    // 6. Chain bundle
    let bundle = build_chain_pem(&[&leaf, &root]);
    let chain = split_chain_pem(bundle.as_bytes())?;
    verify_chain(&chain)?;

    Ok(())
}

#[test]
fn test_pem_reencoding_is_idempotent() -> Result<()> {
    let ca = CertificateAuthority::create(&Subject::new("root.example"), days(365), &OsEntropy)?;
    let (csr, key) = create_csr(&Subject::new("leaf.example"), &[], &OsEntropy)?;

    let cert_pem = encode_certificate(ca.certificate());
    assert_eq!(encode_certificate(&decode_certificate(cert_pem.as_bytes())?), cert_pem);

    let csr_pem = encode_csr(&csr);
    assert_eq!(encode_csr(&decode_csr(csr_pem.as_bytes())?), csr_pem);

    let key_pem = encode_private_key(&key)?;
    assert_eq!(encode_private_key(&decode_private_key(key_pem.as_bytes(), None)?)?, key_pem);

    Ok(())
}

#[test]
fn test_tampered_csr_is_rejected() -> Result<()> {
    let (csr, _) = create_csr(&Subject::new("leaf.example"), &[], &OsEntropy)?;
    let der = csr.to_der().to_vec();

    for i in (0..der.len()).step_by(7) {
        let mut mutated = der.clone();
        mutated[i] ^= 0x80;
        assert!(CertificateRequest::from_der(&mutated).is_err(), "byte {} accepted", i);
    }

    Ok(())
}

#[test]
fn test_chunked_kms_issuance() -> Result<()> {
    let entropy = ChunkedEntropy::new(MockKms::new());

    let ca = CertificateAuthority::create(&Subject::new("root.example"), days(365), &entropy)?;
    let (csr, _) = create_csr(&Subject::new("leaf.example"), &[], &entropy)?;
    let leaf = ca.sign_leaf(&csr, days(30), &entropy)?;
    leaf.verify_issued_by(ca.certificate())?;

    let sizes = entropy.provider().requested_sizes();
    assert!(!sizes.is_empty());
    assert!(sizes.iter().all(|size| *size <= 1024));

    Ok(())
}

#[test]
fn test_large_entropy_request_is_chunked() -> Result<()> {
    let entropy = ChunkedEntropy::new(MockKms::new());
    let mut buf = vec![0u8; 2049];
    entropy.fill(&mut buf)?;

    assert_eq!(entropy.provider().requested_sizes(), vec![1024, 1024, 1]);
    Ok(())
}

#[test]
fn test_entropy_failure_surfaces_unchanged() {
    let entropy = ChunkedEntropy::new(FailingProvider::new(1, 0));

    match CertificateAuthority::create(&Subject::new("root.example"), days(365), &entropy) {
        Err(PkiError::ProviderFailure { filled, .. }) => assert_eq!(filled, 0),
        Err(other) => panic!("Expected ProviderFailure, got {}", other),
        Ok(_) => panic!("Expected ProviderFailure"),
    }
}

#[test]
fn test_concurrent_leaf_signing() -> Result<()> {
    let entropy = Arc::new(ChunkedEntropy::new(OsRandomProvider::new(1024)));
    let ca = Arc::new(CertificateAuthority::create(
        &Subject::new("root.example"),
        days(365),
        entropy.as_ref(),
    )?);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ca = Arc::clone(&ca);
            let entropy = Arc::clone(&entropy);
            thread::spawn(move || -> Result<_> {
                let subject = Subject::new(format!("leaf{}.example", i));
                let (csr, _) = create_csr(&subject, &[], entropy.as_ref())?;
                ca.sign_leaf(&csr, days(30), entropy.as_ref())
            })
        })
        .collect();

    let mut serials = Vec::new();
    for handle in handles {
        let leaf = handle.join().unwrap()?;
        leaf.verify_issued_by(ca.certificate())?;
        serials.push(leaf.serial_number().as_bytes().to_vec());
    }

    serials.sort();
    serials.dedup();
    assert_eq!(serials.len(), 4);

    Ok(())
}

#[test]
fn test_file_based_workflow() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path();

    // 1. CA to disk with an encrypted key
    let ca = CertificateAuthority::create(&Subject::new("root.example"), days(365), &OsEntropy)?;
    let (cert_path, key_path) = ca_paths(out);
    write_certificate_file(ca.certificate(), &cert_path)?;
    write_encrypted_private_key_file(ca.key(), "passphrase", PemCipher::Aes256Cbc, &OsEntropy, &key_path)?;

    // 2. CSR to disk
    let (csr, key) = create_csr(&Subject::new("leaf.example"), &[], &OsEntropy)?;
    let (leaf_key_path, csr_path) = csr_paths(out, "leaf.example");
    write_private_key_file(&key, &leaf_key_path)?;
    write_csr_file(&csr, &csr_path)?;

    // 3. Reload and sign
    let loaded_ca = load_certificate_authority(&cert_path, &key_path, Some("passphrase"))?;
    let loaded_csr = load_csr(&csr_path)?;
    let leaf = loaded_ca.sign_leaf(&loaded_csr, days(30), &OsEntropy)?;
    let leaf_path = certificate_path(out, "leaf.example");
    write_certificate_file(&leaf, &leaf_path)?;

    // 4. Verify from disk
    let reloaded = load_certificate(&leaf_path)?;
    assert_eq!(reloaded, leaf);
    reloaded.verify_issued_by(ca.certificate())?;

    Ok(())
}

#[test]
fn test_error_handling_workflow() -> Result<()> {
    let key = kmspki::crypto::rsa::KeyPair::generate(&OsEntropy)?;
    let encrypted = encode_private_key_encrypted(&key, "right", PemCipher::Aes128Cbc, &OsEntropy)?;

    match decode_private_key(encrypted.as_bytes(), None) {
        Err(PkiError::PassphraseRequired) => {}
        _ => panic!("Expected PassphraseRequired"),
    }
    match decode_private_key(encrypted.as_bytes(), Some("wrong")) {
        Err(PkiError::InvalidPasswordError) => {}
        _ => panic!("Expected InvalidPasswordError"),
    }
    assert_eq!(decode_private_key(encrypted.as_bytes(), Some("right"))?, key);

    match decode_certificate(encrypted.as_bytes()) {
        Err(PkiError::DecodeError(_)) => {}
        _ => panic!("Expected DecodeError"),
    }

    let config = IssuanceConfig::from_json(r#"{"ca_validity_days": 0}"#);
    assert!(matches!(config, Err(PkiError::ConfigError(_))));

    Ok(())
}
