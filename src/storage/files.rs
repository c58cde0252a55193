//! PEM artifact files.
//!
//! Certificates and requests are written world-readable; private keys are
//! written with mode 0600 on Unix.

use crate::cert::ca::CertificateAuthority;
use crate::cert::certificate::IssuedCertificate;
use crate::cert::codec;
use crate::cert::csr::CertificateRequest;
use crate::crypto::pem_encryption::PemCipher;
use crate::crypto::rsa::KeyPair;
use crate::entropy::EntropySource;
use crate::error::{PkiError, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// CA certificate file name inside an output directory.
pub const CA_CERT_FILENAME: &str = "CAcert.pem";

/// CA private key file name inside an output directory.
pub const CA_KEY_FILENAME: &str = "CAkey.pem";

const PUBLIC_MODE: u32 = 0o644;
const PRIVATE_MODE: u32 = 0o600;

/// Paths of the CA certificate and key inside `dir`.
pub fn ca_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join(CA_CERT_FILENAME), dir.join(CA_KEY_FILENAME))
}

/// Paths of the `<cn>.key` and `<cn>.csr` files inside `dir`.
pub fn csr_paths(dir: &Path, common_name: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{}.key", common_name)),
        dir.join(format!("{}.csr", common_name)),
    )
}

/// Path of the `<cn>.pem` file for a signed certificate inside `dir`.
pub fn certificate_path(dir: &Path, common_name: &str) -> PathBuf {
    dir.join(format!("{}.pem", common_name))
}

/// `name` if it is a single plain file name, else `None`.
///
/// Names with path separators, `.` or `..` are refused so that a requester
/// chosen CN cannot place a file outside the output directory.
pub fn plain_file_name(name: &str) -> Option<&str> {
    if name.contains(['/', '\\']) {
        return None;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(name),
        _ => None,
    }
}

/// Path of the signed certificate for the request read from `csr_path`.
///
/// Named after the subject CN when it is a plain file name, otherwise after
/// the CSR file stem.
pub fn signed_certificate_path(
    dir: &Path,
    common_name: Option<&str>,
    csr_path: &Path,
) -> PathBuf {
    if let Some(name) = common_name.and_then(plain_file_name) {
        return certificate_path(dir, name);
    }

    let stem = csr_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "certificate".to_string());
    warn!(
        common_name = common_name.unwrap_or(""),
        stem = %stem,
        "common name is not a usable file name, using CSR file name"
    );
    certificate_path(dir, &stem)
}

fn write_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path).map_err(PkiError::StorageError)?;
    file.write_all(contents).map_err(PkiError::StorageError)?;

    // `mode` only applies on creation; tighten files that already existed.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(PkiError::StorageError)?;
    }

    info!(path = %path.display(), "wrote file");
    Ok(())
}

/// Write a certificate as PEM.
pub fn write_certificate_file(certificate: &IssuedCertificate, path: &Path) -> Result<()> {
    write_file(path, codec::encode_certificate(certificate).as_bytes(), PUBLIC_MODE)
}

/// Write a signing request as PEM.
pub fn write_csr_file(csr: &CertificateRequest, path: &Path) -> Result<()> {
    write_file(path, codec::encode_csr(csr).as_bytes(), PUBLIC_MODE)
}

/// Write an unencrypted private key as PEM.
pub fn write_private_key_file(key: &KeyPair, path: &Path) -> Result<()> {
    write_file(path, codec::encode_private_key(key)?.as_bytes(), PRIVATE_MODE)
}

/// Write a passphrase-protected private key as PEM.
pub fn write_encrypted_private_key_file<E: EntropySource + ?Sized>(
    key: &KeyPair,
    passphrase: &str,
    cipher: PemCipher,
    entropy: &E,
    path: &Path,
) -> Result<()> {
    let pem = codec::encode_private_key_encrypted(key, passphrase, cipher, entropy)?;
    write_file(path, pem.as_bytes(), PRIVATE_MODE)
}

/// Read a whole PEM file.
pub fn read_pem_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(PkiError::StorageError)
}

/// Load a certificate from a PEM file.
pub fn load_certificate(path: &Path) -> Result<IssuedCertificate> {
    codec::decode_certificate(&read_pem_file(path)?)
}

/// Load and verify a signing request from a PEM file.
pub fn load_csr(path: &Path) -> Result<CertificateRequest> {
    codec::decode_csr(&read_pem_file(path)?)
}

/// Load a CA certificate and its key from PEM files.
pub fn load_certificate_authority(
    cert_path: &Path,
    key_path: &Path,
    passphrase: Option<&str>,
) -> Result<CertificateAuthority> {
    let cert_pem = read_pem_file(cert_path)?;
    let key_pem = read_pem_file(key_path)?;
    CertificateAuthority::from_pem(&cert_pem, &key_pem, passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::csr::create_csr;
    use crate::cert::name::Subject;
    use crate::config::days;
    use crate::entropy::OsEntropy;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let dir = Path::new("/tmp/out");
        assert_eq!(ca_paths(dir).0, dir.join("CAcert.pem"));
        assert_eq!(ca_paths(dir).1, dir.join("CAkey.pem"));
        assert_eq!(csr_paths(dir, "leaf.example").0, dir.join("leaf.example.key"));
        assert_eq!(csr_paths(dir, "leaf.example").1, dir.join("leaf.example.csr"));
        assert_eq!(certificate_path(dir, "leaf.example"), dir.join("leaf.example.pem"));
    }

    #[test]
    fn test_plain_file_name() {
        assert_eq!(plain_file_name("leaf.example"), Some("leaf.example"));
        assert_eq!(plain_file_name("*.example.com"), Some("*.example.com"));
        assert_eq!(plain_file_name(""), None);
        assert_eq!(plain_file_name("."), None);
        assert_eq!(plain_file_name(".."), None);
        assert_eq!(plain_file_name("../../etc/ssl/certs/victim"), None);
        assert_eq!(plain_file_name("/etc/passwd"), None);
        assert_eq!(plain_file_name("dir/"), None);
        assert_eq!(plain_file_name("..\\victim"), None);
    }

    #[test]
    fn test_signed_certificate_path_stays_in_output_dir() {
        let dir = Path::new("/tmp/out");
        let csr_path = Path::new("/requests/leaf.csr");

        assert_eq!(
            signed_certificate_path(dir, Some("leaf.example"), csr_path),
            dir.join("leaf.example.pem")
        );
        assert_eq!(
            signed_certificate_path(dir, Some("../../etc/ssl/certs/victim"), csr_path),
            dir.join("leaf.pem")
        );
        assert_eq!(signed_certificate_path(dir, None, csr_path), dir.join("leaf.pem"));
        assert_eq!(
            signed_certificate_path(dir, Some(".."), Path::new("..")),
            dir.join("certificate.pem")
        );
    }

    #[test]
    fn test_write_and_load_authority() {
        let temp_dir = TempDir::new().unwrap();
        let (cert_path, key_path) = ca_paths(temp_dir.path());
        let ca = CertificateAuthority::create(&Subject::new("root.example"), days(365), &OsEntropy).unwrap();

        write_certificate_file(ca.certificate(), &cert_path).unwrap();
        write_private_key_file(ca.key(), &key_path).unwrap();

        let loaded = load_certificate_authority(&cert_path, &key_path, None).unwrap();
        assert_eq!(loaded.certificate(), ca.certificate());
        assert_eq!(loaded.key(), ca.key());
    }

    #[test]
    fn test_write_encrypted_key() {
        let temp_dir = TempDir::new().unwrap();
        let (cert_path, key_path) = ca_paths(temp_dir.path());
        let ca = CertificateAuthority::create(&Subject::new("root.example"), days(365), &OsEntropy).unwrap();

        write_certificate_file(ca.certificate(), &cert_path).unwrap();
        write_encrypted_private_key_file(ca.key(), "pw", PemCipher::Aes256Cbc, &OsEntropy, &key_path).unwrap();

        match load_certificate_authority(&cert_path, &key_path, None) {
            Err(PkiError::PassphraseRequired) => {}
            _ => panic!("Expected PassphraseRequired"),
        }
        assert!(load_certificate_authority(&cert_path, &key_path, Some("pw")).is_ok());
    }

    #[test]
    fn test_write_and_load_csr() {
        let temp_dir = TempDir::new().unwrap();
        let (key_path, csr_path) = csr_paths(temp_dir.path(), "leaf.example");
        let (csr, key) = create_csr(&Subject::new("leaf.example"), &[], &OsEntropy).unwrap();

        write_private_key_file(&key, &key_path).unwrap();
        write_csr_file(&csr, &csr_path).unwrap();

        assert_eq!(load_csr(&csr_path).unwrap(), csr);
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let key_path = temp_dir.path().join("key.pem");
        let cert_path = temp_dir.path().join("cert.pem");
        let ca = CertificateAuthority::create(&Subject::new("root.example"), days(365), &OsEntropy).unwrap();

        write_private_key_file(ca.key(), &key_path).unwrap();
        write_certificate_file(ca.certificate(), &cert_path).unwrap();

        let key_mode = fs::metadata(&key_path).unwrap().permissions().mode() & 0o777;
        let cert_mode = fs::metadata(&cert_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(key_mode, 0o600);
        assert_eq!(cert_mode, 0o644);
    }

    #[test]
    fn test_read_missing_file() {
        match read_pem_file(Path::new("/nonexistent/kmspki/file.pem")) {
            Err(PkiError::StorageError(_)) => {}
            _ => panic!("Expected StorageError"),
        }
    }
}
