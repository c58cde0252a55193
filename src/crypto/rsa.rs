//! RSA key operations.
//!
//! Keys are 2048-bit RSA, signatures are PKCS#1 v1.5 over SHA-256. Key
//! generation draws its randomness from an [`EntropySource`] and nothing else.

use crate::config::KEY_BITS;
use crate::entropy::{seeded_rng, EntropySource};
use crate::error::{PkiError, Result};
use der::{Decode, Encode};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use spki::SubjectPublicKeyInfoOwned;
use tracing::debug;

/// An RSA private key and its public half.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPair {
    pub secret: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl KeyPair {
    /// Create a keypair from a private key.
    pub fn from_secret(secret: RsaPrivateKey) -> Self {
        let public = secret.to_public_key();
        Self { secret, public }
    }

    /// Generate a fresh 2048-bit keypair from `entropy`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use kmspki::crypto::rsa::KeyPair;
    /// use kmspki::entropy::OsEntropy;
    ///
    /// let keypair = KeyPair::generate(&OsEntropy).unwrap();
    /// assert_eq!(keypair.bits(), 2048);
    /// ```
    pub fn generate<E: EntropySource + ?Sized>(entropy: &E) -> Result<Self> {
        let mut rng = seeded_rng(entropy)?;
        let secret = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| PkiError::CryptoError(format!("Failed to generate RSA key: {}", e)))?;
        debug!(bits = KEY_BITS, "generated RSA keypair");
        Ok(Self::from_secret(secret))
    }

    /// Parse a PKCS#1 `RSAPrivateKey` DER structure.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let secret = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| PkiError::ParseError(format!("Invalid PKCS#1 private key: {}", e)))?;
        Ok(Self::from_secret(secret))
    }

    /// PKCS#1 `RSAPrivateKey` DER encoding of the private key.
    pub fn to_pkcs1_der(&self) -> Result<Vec<u8>> {
        let doc = self
            .secret
            .to_pkcs1_der()
            .map_err(|e| PkiError::InvalidKeyError(format!("Failed to encode private key: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// PKCS#1 `RSAPublicKey` DER encoding of the public key.
    pub fn public_key_pkcs1_der(&self) -> Result<Vec<u8>> {
        public_key_pkcs1_der(&self.public)
    }

    /// The public key as an X.509 `SubjectPublicKeyInfo`.
    pub fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let doc = self
            .public
            .to_public_key_der()
            .map_err(|e| PkiError::InvalidKeyError(format!("Failed to encode public key: {}", e)))?;
        SubjectPublicKeyInfoOwned::from_der(doc.as_bytes())
            .map_err(|e| PkiError::InvalidKeyError(format!("Failed to decode public key info: {}", e)))
    }

    /// True when `spki` carries this keypair's public key.
    pub fn matches_public_key_info(&self, spki: &SubjectPublicKeyInfoOwned) -> bool {
        match public_key_from_spki(spki) {
            Ok(public) => public == self.public,
            Err(_) => false,
        }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    /// Sign a message with SHA-256 / PKCS#1 v1.5.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::<Sha256>::new(self.secret.clone());
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| PkiError::SignatureGeneration(format!("RSA signing failed: {}", e)))?;
        Ok(signature.to_vec())
    }

    /// Verify a signature made by this keypair.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        verify_signature(&self.public, message, signature)
    }
}

/// PKCS#1 `RSAPublicKey` DER encoding of `public`.
pub fn public_key_pkcs1_der(public: &RsaPublicKey) -> Result<Vec<u8>> {
    let doc = public
        .to_pkcs1_der()
        .map_err(|e| PkiError::InvalidKeyError(format!("Failed to encode public key: {}", e)))?;
    Ok(doc.as_bytes().to_vec())
}

/// Extract an RSA public key from a `SubjectPublicKeyInfo`.
pub fn public_key_from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<RsaPublicKey> {
    let der = spki
        .to_der()
        .map_err(|e| PkiError::InvalidKeyError(format!("Failed to encode public key info: {}", e)))?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| PkiError::InvalidKeyError(format!("Not an RSA public key: {}", e)))
}

/// Verify a SHA-256 / PKCS#1 v1.5 signature.
pub fn verify_signature(public: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let signature = Signature::try_from(signature)
        .map_err(|e| PkiError::SignatureInvalid(format!("Malformed signature: {}", e)))?;
    VerifyingKey::<Sha256>::new(public.clone())
        .verify(message, &signature)
        .map_err(|e| PkiError::SignatureInvalid(format!("Signature verification failed: {}", e)))
}
